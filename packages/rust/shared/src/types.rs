//! Core domain types for the Rivet routing engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum accepted query length in bytes.
pub const MAX_QUERY_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Vendor / equipment taxonomy
// ---------------------------------------------------------------------------

/// Equipment vendors Rivet knows how to route for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorTag {
    Siemens,
    AllenBradley,
    Abb,
    SchneiderElectric,
    Mitsubishi,
    Danfoss,
    /// Catch-all for unrecognized or tied vendors.
    Generic,
}

impl VendorTag {
    /// The vendor's support-site domain, used for site-restricted search
    /// terms. `Generic` has no domain.
    pub fn site_domain(&self) -> Option<&'static str> {
        match self {
            Self::Siemens => Some("support.industry.siemens.com"),
            Self::AllenBradley => Some("rockwellautomation.com"),
            Self::Abb => Some("library.abb.com"),
            Self::SchneiderElectric => Some("se.com"),
            Self::Mitsubishi => Some("mitsubishielectric.com"),
            Self::Danfoss => Some("danfoss.com"),
            Self::Generic => None,
        }
    }
}

impl std::fmt::Display for VendorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Siemens => "siemens",
            Self::AllenBradley => "allen-bradley",
            Self::Abb => "abb",
            Self::SchneiderElectric => "schneider electric",
            Self::Mitsubishi => "mitsubishi",
            Self::Danfoss => "danfoss",
            Self::Generic => "generic",
        };
        write!(f, "{name}")
    }
}

/// Equipment classes covered by the troubleshooting taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentTag {
    VariableFrequencyDrive,
    Plc,
    Hmi,
    ServoDrive,
    SoftStarter,
    PowerSupply,
}

impl std::fmt::Display for EquipmentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::VariableFrequencyDrive => "vfd",
            Self::Plc => "plc",
            Self::Hmi => "hmi",
            Self::ServoDrive => "servo drive",
            Self::SoftStarter => "soft starter",
            Self::PowerSupply => "power supply",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// What the vendor detector extracted from a query.
///
/// Produced once per request and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Detected vendor, if any.
    pub vendor: Option<VendorTag>,
    /// Detected equipment class, if any.
    pub equipment: Option<EquipmentTag>,
    /// Fault codes found in the query text (e.g., `F0003`).
    pub fault_codes: Vec<String>,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

// ---------------------------------------------------------------------------
// KbCoverage
// ---------------------------------------------------------------------------

/// How well the knowledge base covers a query's topic.
///
/// Ordered: `None < Thin < Strong`, which the router's vendor tie-break
/// relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KbCoverage {
    /// 0–2 matching documents: the KB cannot answer.
    None,
    /// 3–7 matching documents: answerable, but worth densifying.
    Thin,
    /// 8+ matching documents: answer directly.
    Strong,
}

impl KbCoverage {
    /// Map a count of above-floor matches to a coverage level.
    pub fn from_match_count(count: usize) -> Self {
        match count {
            0..=2 => Self::None,
            3..=7 => Self::Thin,
            _ => Self::Strong,
        }
    }
}

// ---------------------------------------------------------------------------
// RouteDecision
// ---------------------------------------------------------------------------

/// The four handling routes. Exactly one is chosen per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Route A: strong coverage, answer directly from the SME agent.
    Direct,
    /// Route B: thin coverage, answer now and schedule enrichment research.
    Enrich,
    /// Route C: no coverage, LLM fallback answer plus full research.
    Research,
    /// Route D: low detection confidence, ask the user to clarify.
    Clarify,
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Enrich => "enrich",
            Self::Research => "research",
            Self::Clarify => "clarify",
        };
        write!(f, "{name}")
    }
}

/// The inputs a routing decision was based on, attached to the response
/// for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrail {
    /// Detection confidence the router saw.
    pub confidence: f32,
    /// Confidence threshold in effect.
    pub threshold: f32,
    /// Coverage level the router saw.
    pub coverage: KbCoverage,
    /// Alternatives considered (tie-breaks, fallbacks taken).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

// ---------------------------------------------------------------------------
// IngestionTrigger
// ---------------------------------------------------------------------------

/// Research urgency for an ingestion trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Kinds of research sources the scheduler can pull from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    VendorSite,
    Forum,
    Manual,
    KnowledgeArticle,
}

impl SourceKind {
    /// Stable string form used in the fingerprint table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VendorSite => "vendor_site",
            Self::Forum => "forum",
            Self::Manual => "manual",
            Self::KnowledgeArticle => "knowledge_article",
        }
    }

    /// Inverse of [`SourceKind::as_str`]. Unknown strings map to
    /// `KnowledgeArticle` so old rows never fail to load.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "vendor_site" => Self::VendorSite,
            "forum" => Self::Forum,
            "manual" => Self::Manual,
            _ => Self::KnowledgeArticle,
        }
    }
}

/// Structured description of what to research and how urgently.
///
/// Pure data produced by the gap detector; never performs I/O itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionTrigger {
    /// Deduplicated search queries, between the configured min and max.
    pub search_terms: Vec<String>,
    /// Research urgency.
    pub priority: Priority,
    /// Which source kinds are worth pulling for this gap.
    pub candidate_sources: Vec<SourceKind>,
}

// ---------------------------------------------------------------------------
// SourceFingerprint
// ---------------------------------------------------------------------------

/// Deduplication record for a candidate research URL.
///
/// `url_hash` uniqueness is the single correctness invariant preventing
/// duplicate ingestion under concurrent callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFingerprint {
    /// Hex SHA-256 of the normalized URL (unique key).
    pub url_hash: String,
    /// The original URL.
    pub url: String,
    /// Where the source came from.
    pub source_type: SourceKind,
    /// When the fingerprint was created (or last re-reserved).
    pub created_at: DateTime<Utc>,
    /// Set when reserved; flips false→true exactly once per reservation.
    pub queued: bool,
    /// Set at most once, only after ingestion succeeds.
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// KB documents
// ---------------------------------------------------------------------------

/// A ranked document returned by the external KB store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedDoc {
    /// KB-internal document identifier.
    pub id: String,
    /// Document title.
    pub title: String,
    /// Short extract for citation display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Where the document was originally ingested from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Similarity score in `[0, 1]` against the query.
    pub similarity: f32,
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// An incoming troubleshooting query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RivetRequest {
    /// Free-text user query.
    pub query: String,
    /// Originating channel (e.g., "telegram"), for logging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl RivetRequest {
    /// Create a request from a query string.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            channel: None,
        }
    }

    /// Reject malformed input before any routing work happens.
    ///
    /// This is the only failure `route` surfaces to the caller.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.query.trim().is_empty() {
            return Err(crate::error::RivetError::validation(
                "query must not be empty",
            ));
        }
        if self.query.len() > MAX_QUERY_BYTES {
            return Err(crate::error::RivetError::validation(format!(
                "query exceeds {MAX_QUERY_BYTES} bytes"
            )));
        }
        Ok(())
    }
}

/// A citation attached to a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Document title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Source URL of the cited document.
    pub url: String,
}

/// The answer returned by an SME agent.
#[derive(Debug, Clone)]
pub struct AgentAnswer {
    /// Answer text.
    pub text: String,
    /// Agent self-reported confidence in `[0, 1]`.
    pub confidence: f32,
}

/// The user-facing result of routing one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RivetResponse {
    /// Answer or clarification text. Always non-empty.
    pub text: String,
    /// Which route produced this response.
    pub route_taken: RouteDecision,
    /// Identifier of the agent (or fallback) that produced the text.
    pub agent_id: String,
    /// Confidence of the answer in `[0, 1]`.
    pub confidence: f32,
    /// True when a failure forced a fallback path.
    pub degraded: bool,
    /// True when background research was scheduled for this request.
    pub research_triggered: bool,
    /// Inputs the routing decision was based on.
    pub trail: DecisionTrail,
    /// Citations backing the answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_from_match_count() {
        assert_eq!(KbCoverage::from_match_count(0), KbCoverage::None);
        assert_eq!(KbCoverage::from_match_count(2), KbCoverage::None);
        assert_eq!(KbCoverage::from_match_count(3), KbCoverage::Thin);
        assert_eq!(KbCoverage::from_match_count(7), KbCoverage::Thin);
        assert_eq!(KbCoverage::from_match_count(8), KbCoverage::Strong);
        assert_eq!(KbCoverage::from_match_count(100), KbCoverage::Strong);
    }

    #[test]
    fn source_kind_roundtrip() {
        for kind in [
            SourceKind::VendorSite,
            SourceKind::Forum,
            SourceKind::Manual,
            SourceKind::KnowledgeArticle,
        ] {
            assert_eq!(SourceKind::from_str_lossy(kind.as_str()), kind);
        }
        // Unknown strings degrade instead of failing
        assert_eq!(
            SourceKind::from_str_lossy("mystery"),
            SourceKind::KnowledgeArticle
        );
    }

    #[test]
    fn request_validation() {
        assert!(RivetRequest::new("drive faults on startup").validate().is_ok());
        assert!(RivetRequest::new("").validate().is_err());
        assert!(RivetRequest::new("   \n\t ").validate().is_err());
        assert!(RivetRequest::new("x".repeat(MAX_QUERY_BYTES + 1)).validate().is_err());
    }

    #[test]
    fn vendor_site_domains() {
        assert!(VendorTag::Siemens.site_domain().is_some());
        assert!(VendorTag::Generic.site_domain().is_none());
    }

    #[test]
    fn trigger_serialization() {
        let trigger = IngestionTrigger {
            search_terms: vec![
                "siemens g120c fault f0003".into(),
                "g120c troubleshooting guide".into(),
            ],
            priority: Priority::High,
            candidate_sources: vec![SourceKind::VendorSite, SourceKind::Forum],
        };

        let json = serde_json::to_string(&trigger).expect("serialize");
        let parsed: IngestionTrigger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, trigger);
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }
}
