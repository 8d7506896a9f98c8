//! Knowledge-gap analysis: turns an unanswerable (or thinly answered)
//! query into a structured ingestion trigger.
//!
//! `analyze` is a pure function over `(request, intent, coverage)` — no
//! I/O, no clock, no randomness. The scheduler owns everything effectful.

use rivet_shared::{
    GapConfig, IngestionTrigger, Intent, KbCoverage, Priority, RivetRequest, SourceKind,
};

use crate::vendor::VendorDetector;

/// Phrases that force HIGH priority regardless of other signals.
const SAFETY_KEYWORDS: &[&str] = &[
    "arc flash",
    "shock",
    "smoke",
    "burning",
    "fire",
    "sparks",
    "tripped breaker",
    "overheating",
    "melted",
];

/// Fallback query terms appended when term generation comes up short.
const GENERIC_SUFFIXES: &[&str] = &["troubleshooting", "manual pdf", "fault codes"];

/// Produces ingestion triggers for queries the KB cannot answer well.
pub struct GapDetector {
    config: GapConfig,
    detector: VendorDetector,
}

impl GapDetector {
    /// Build a gap detector with the given term bounds.
    pub fn new(config: GapConfig) -> Self {
        Self {
            config,
            detector: VendorDetector::new(),
        }
    }

    /// Analyze a request and produce the research trigger for it.
    ///
    /// Deterministic: identical inputs always yield an identical trigger.
    pub fn analyze(
        &self,
        request: &RivetRequest,
        intent: &Intent,
        coverage: KbCoverage,
    ) -> IngestionTrigger {
        let lower = request.query.to_lowercase();
        let models = self.detector.extract_models(&request.query);
        let fault_codes = &intent.fault_codes;

        let priority = self.priority_for(&lower, intent, &models);
        let search_terms = self.build_terms(&lower, intent, &models);
        let candidate_sources = candidate_sources(intent, coverage, priority);

        tracing::debug!(
            priority = ?priority,
            terms = search_terms.len(),
            fault_codes = fault_codes.len(),
            "gap analysis"
        );

        IngestionTrigger {
            search_terms,
            priority,
            candidate_sources,
        }
    }

    /// HIGH on fault codes or safety phrases, MEDIUM for equipment-specific
    /// queries, LOW for purely conceptual ones.
    fn priority_for(&self, lower: &str, intent: &Intent, models: &[String]) -> Priority {
        if !intent.fault_codes.is_empty() || SAFETY_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Priority::High
        } else if intent.equipment.is_some() || !models.is_empty() {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    /// Combine vendor, equipment, model, and fault-code signals into
    /// between `min_search_terms` and `max_search_terms` deduped queries.
    fn build_terms(&self, lower: &str, intent: &Intent, models: &[String]) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        fn push(terms: &mut Vec<String>, t: String) {
            let t = t.trim().to_lowercase();
            if !t.is_empty() && !terms.contains(&t) {
                terms.push(t);
            }
        }

        let vendor = intent.vendor.map(|v| v.to_string());
        let model = models.first().cloned();

        // The topic the query is about, most specific form first.
        let topic = match (&vendor, &model, intent.equipment) {
            (Some(v), Some(m), _) => format!("{v} {m}"),
            (Some(v), None, Some(e)) => format!("{v} {e}"),
            (Some(v), None, None) => v.clone(),
            (None, Some(m), _) => m.clone(),
            (None, None, Some(e)) => e.to_string(),
            (None, None, None) => lower.to_string(),
        };

        // Fault-specific terms come first: they are what the user is stuck on.
        for code in intent.fault_codes.iter().take(2) {
            push(&mut terms, format!("{topic} fault {code}"));
        }

        // One vendor-site-restricted term when the vendor has a domain.
        if let Some(domain) = intent.vendor.and_then(|v| v.site_domain()) {
            match &model {
                Some(m) => push(&mut terms, format!("site:{domain} {m}")),
                None => push(&mut terms, format!("site:{domain} {topic}")),
            }
        }

        // Always include a generic troubleshooting-guide term.
        push(&mut terms, format!("{topic} troubleshooting guide"));

        if let Some(e) = intent.equipment {
            if vendor.is_some() {
                push(&mut terms, format!("{topic} {e} fault codes"));
            }
        }

        // The raw query itself is often the best forum search.
        push(&mut terms, lower.to_string());

        // Pad deterministically up to the minimum.
        for suffix in GENERIC_SUFFIXES {
            if terms.len() >= self.config.min_search_terms {
                break;
            }
            push(&mut terms, format!("{topic} {suffix}"));
        }

        terms.truncate(self.config.max_search_terms);
        terms
    }
}

/// Which source kinds are worth pulling for this gap.
///
/// Vendors with documentation sites get vendor + manual sources; forums
/// are always useful; conceptual (LOW) gaps and empty-KB topics benefit
/// from knowledge-base articles and foundational manuals.
fn candidate_sources(intent: &Intent, coverage: KbCoverage, priority: Priority) -> Vec<SourceKind> {
    let mut sources = Vec::new();
    if intent.vendor.is_some() {
        sources.push(SourceKind::VendorSite);
        sources.push(SourceKind::Manual);
    } else if coverage == KbCoverage::None {
        sources.push(SourceKind::Manual);
    }
    sources.push(SourceKind::Forum);
    if priority == Priority::Low {
        sources.push(SourceKind::KnowledgeArticle);
    }
    sources
}
