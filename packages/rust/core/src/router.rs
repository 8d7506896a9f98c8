//! Request routing: the decision core of Rivet.
//!
//! Every request flows detect → (tie-break) → coverage → decide →
//! dispatch. The decision itself is the pure [`decide`] function; all
//! timeouts, fallbacks, and research scheduling live around it. The only
//! error `route` surfaces is input validation — everything downstream
//! degrades instead of failing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use rivet_detect::{GapDetector, VendorDetector};
use rivet_research::ResearchScheduler;
use rivet_shared::{
    Artifact, DecisionTrail, Intent, KbCoverage, Result, RivetRequest, RivetResponse,
    RouteDecision, RouterConfig, VendorTag,
};

use crate::agents::{LlmFallback, SmeAgentRegistry};
use crate::coverage::{CoverageEstimate, CoverageEvaluator};

/// Agent id reported when the LLM fallback produced the response text.
const FALLBACK_AGENT_ID: &str = "llm-fallback";

/// Maximum citations attached to a response.
const MAX_ARTIFACTS: usize = 3;

/// Clarification shown when even the LLM fallback is unavailable.
const CANNED_CLARIFY: &str = "Could you share the equipment vendor, the model number, \
     and any fault code shown on the display? That will let me pull up the right \
     troubleshooting material.";

/// Answer shown when both the SME agent and the LLM fallback failed.
const CANNED_UNAVAILABLE: &str = "I could not generate an answer right now. Please try \
     again shortly, and include the vendor, model, and fault code if you have them.";

// ---------------------------------------------------------------------------
// Pure decision function
// ---------------------------------------------------------------------------

/// Map detection confidence and KB coverage to a route.
///
/// Low confidence always wins: a query the detector cannot place is
/// clarified, never guessed at. Above the threshold, coverage alone
/// picks the route.
pub fn decide(confidence: f32, threshold: f32, coverage: KbCoverage) -> RouteDecision {
    if confidence < threshold {
        return RouteDecision::Clarify;
    }
    match coverage {
        KbCoverage::Strong => RouteDecision::Direct,
        KbCoverage::Thin => RouteDecision::Enrich,
        KbCoverage::None => RouteDecision::Research,
    }
}

// ---------------------------------------------------------------------------
// RequestRouter
// ---------------------------------------------------------------------------

/// Routes troubleshooting requests to the appropriate handling path.
pub struct RequestRouter {
    detector: VendorDetector,
    gap: GapDetector,
    evaluator: CoverageEvaluator,
    registry: SmeAgentRegistry,
    fallback: Arc<dyn LlmFallback>,
    scheduler: ResearchScheduler,
    config: RouterConfig,
}

impl RequestRouter {
    /// Assemble a router from its collaborators.
    pub fn new(
        detector: VendorDetector,
        gap: GapDetector,
        evaluator: CoverageEvaluator,
        registry: SmeAgentRegistry,
        fallback: Arc<dyn LlmFallback>,
        scheduler: ResearchScheduler,
        config: RouterConfig,
    ) -> Self {
        Self {
            detector,
            gap,
            evaluator,
            registry,
            fallback,
            scheduler,
            config,
        }
    }

    /// Route one request end to end.
    ///
    /// Fails only on invalid input. SME, LLM, and KB failures degrade the
    /// response instead; research scheduling is fire-and-forget and never
    /// blocks the reply.
    #[instrument(skip_all, fields(channel = request.channel.as_deref().unwrap_or("unknown")))]
    pub async fn route(&self, request: &RivetRequest) -> Result<RivetResponse> {
        request.validate()?;

        let detection = self.detector.detect(&request.query);
        let mut intent = detection.intent;
        let threshold = self.config.confidence_threshold;
        let mut alternatives: Vec<String> = Vec::new();

        // Confidence gate first: a query we cannot place never costs a KB
        // round trip.
        if intent.confidence < threshold {
            alternatives.push("coverage not evaluated: confidence below threshold".into());
            let trail = DecisionTrail {
                confidence: intent.confidence,
                threshold,
                coverage: KbCoverage::None,
                alternatives,
            };
            return Ok(self.clarify(request, trail).await);
        }

        // Tie-break: two vendors with identical scores resolve by which
        // one the KB historically covers better. A full tie goes generic.
        if let Some((runner, _)) = detection.runner_up {
            if let Some(top) = intent.vendor {
                intent.vendor = self.break_tie(top, runner, &mut alternatives).await;
            }
        }

        let estimate = self.evaluator.estimate(&request.query, &intent).await;
        let decision = decide(intent.confidence, threshold, estimate.coverage);

        info!(
            route = %decision,
            confidence = intent.confidence,
            coverage = ?estimate.coverage,
            "routing decision"
        );

        let trail = DecisionTrail {
            confidence: intent.confidence,
            threshold,
            coverage: estimate.coverage,
            alternatives,
        };

        let response = match decision {
            RouteDecision::Direct => self.answer_direct(&intent, &estimate, trail).await,
            RouteDecision::Enrich => self.answer_enrich(request, &intent, &estimate, trail).await,
            RouteDecision::Research => {
                self.answer_research(request, &intent, estimate.coverage, trail)
                    .await
            }
            RouteDecision::Clarify => self.clarify(request, trail).await,
        };

        Ok(response)
    }

    /// Resolve a vendor score tie by historical KB coverage.
    async fn break_tie(
        &self,
        top: VendorTag,
        runner: VendorTag,
        alternatives: &mut Vec<String>,
    ) -> Option<VendorTag> {
        let top_cov = self.evaluator.estimate_for_vendor(top).await;
        let runner_cov = self.evaluator.estimate_for_vendor(runner).await;

        match top_cov.cmp(&runner_cov) {
            std::cmp::Ordering::Less => {
                alternatives.push(format!(
                    "vendor tie: picked {runner} over {top} on kb coverage"
                ));
                Some(runner)
            }
            std::cmp::Ordering::Greater => {
                alternatives.push(format!(
                    "vendor tie: picked {top} over {runner} on kb coverage"
                ));
                Some(top)
            }
            std::cmp::Ordering::Equal => {
                alternatives.push(format!(
                    "vendor tie unresolved between {top} and {runner}, dispatching generic"
                ));
                None
            }
        }
    }

    /// Route A: answer directly from the SME agent.
    async fn answer_direct(
        &self,
        intent: &Intent,
        estimate: &CoverageEstimate,
        trail: DecisionTrail,
    ) -> RivetResponse {
        let (text, agent_id, confidence, degraded) = self.sme_answer(intent, estimate).await;
        RivetResponse {
            text,
            route_taken: RouteDecision::Direct,
            agent_id,
            confidence,
            degraded,
            research_triggered: false,
            trail,
            artifacts: artifacts_from(estimate),
        }
    }

    /// Route B: answer now, densify the KB in the background.
    async fn answer_enrich(
        &self,
        request: &RivetRequest,
        intent: &Intent,
        estimate: &CoverageEstimate,
        trail: DecisionTrail,
    ) -> RivetResponse {
        let (text, agent_id, confidence, degraded) = self.sme_answer(intent, estimate).await;
        let research_triggered = self.schedule_research(request, intent, estimate.coverage);

        RivetResponse {
            text,
            route_taken: RouteDecision::Enrich,
            agent_id,
            confidence,
            degraded,
            research_triggered,
            trail,
            artifacts: artifacts_from(estimate),
        }
    }

    /// Route C: LLM fallback answer plus full research.
    async fn answer_research(
        &self,
        request: &RivetRequest,
        intent: &Intent,
        coverage: KbCoverage,
        trail: DecisionTrail,
    ) -> RivetResponse {
        let prompt = format!(
            "You are an industrial equipment troubleshooting assistant. The internal \
             knowledge base has no material on this yet, so answer from general \
             knowledge and say so. Question: {}",
            request.query
        );

        let (mut text, degraded) = match self.generate_bounded(&prompt).await {
            Some(text) => (text, false),
            None => (CANNED_UNAVAILABLE.to_string(), true),
        };

        let research_triggered = self.schedule_research(request, intent, coverage);
        if research_triggered {
            text.push_str(&format!(
                "\n\nI'm researching this further in the background — check back in \
                 ~{} minutes for a more specific answer.",
                self.config.research_note_minutes
            ));
        }

        RivetResponse {
            text,
            route_taken: RouteDecision::Research,
            agent_id: FALLBACK_AGENT_ID.to_string(),
            confidence: 0.3,
            degraded,
            research_triggered,
            trail,
            artifacts: Vec::new(),
        }
    }

    /// Route D: ask the user for the missing details.
    async fn clarify(&self, request: &RivetRequest, trail: DecisionTrail) -> RivetResponse {
        let prompt = format!(
            "A user asked an industrial troubleshooting question, but it is missing \
             the details needed to route it (vendor, model, fault code). Write one \
             short, friendly clarifying question. Their message: {}",
            request.query
        );

        let (text, degraded) = match self.generate_bounded(&prompt).await {
            Some(text) => (text, false),
            None => (CANNED_CLARIFY.to_string(), true),
        };

        RivetResponse {
            text,
            route_taken: RouteDecision::Clarify,
            agent_id: FALLBACK_AGENT_ID.to_string(),
            confidence: trail.confidence,
            degraded,
            research_triggered: false,
            trail,
            artifacts: Vec::new(),
        }
    }

    /// Dispatch the SME agent with a timeout; fall back to the LLM on any
    /// failure. Returns (text, agent_id, confidence, degraded).
    async fn sme_answer(
        &self,
        intent: &Intent,
        estimate: &CoverageEstimate,
    ) -> (String, String, f32, bool) {
        let agent = self.registry.agent_for(intent.vendor);
        let timeout = Duration::from_secs(self.config.sme_timeout_secs);

        match tokio::time::timeout(timeout, agent.generate_answer(intent, &estimate.docs)).await {
            Ok(Ok(answer)) => (answer.text, agent.id().to_string(), answer.confidence, false),
            Ok(Err(e)) => {
                warn!(agent = agent.id(), error = %e, "sme agent failed, using llm fallback");
                self.llm_rescue(intent, estimate).await
            }
            Err(_) => {
                warn!(
                    agent = agent.id(),
                    timeout_secs = self.config.sme_timeout_secs,
                    "sme agent timed out, using llm fallback"
                );
                self.llm_rescue(intent, estimate).await
            }
        }
    }

    /// LLM stand-in for a failed SME agent. Always degraded.
    async fn llm_rescue(
        &self,
        intent: &Intent,
        estimate: &CoverageEstimate,
    ) -> (String, String, f32, bool) {
        let docs: Vec<String> = estimate
            .docs
            .iter()
            .take(5)
            .map(|d| match &d.snippet {
                Some(s) => format!("- {}: {s}", d.title),
                None => format!("- {}", d.title),
            })
            .collect();
        let prompt = format!(
            "Answer this industrial troubleshooting question using the reference \
             material below. Vendor: {}. Question context: fault codes {:?}.\n{}",
            intent.vendor.map_or_else(|| "unknown".into(), |v| v.to_string()),
            intent.fault_codes,
            docs.join("\n"),
        );

        match self.generate_bounded(&prompt).await {
            Some(text) => (text, FALLBACK_AGENT_ID.to_string(), 0.4, true),
            None => (
                CANNED_UNAVAILABLE.to_string(),
                FALLBACK_AGENT_ID.to_string(),
                0.0,
                true,
            ),
        }
    }

    /// LLM call under the same timeout as SME dispatch. `None` on error,
    /// timeout, or an empty completion.
    async fn generate_bounded(&self, prompt: &str) -> Option<String> {
        let timeout = Duration::from_secs(self.config.sme_timeout_secs);
        match tokio::time::timeout(timeout, self.fallback.generate(prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                warn!("llm fallback returned an empty completion");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "llm fallback failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.sme_timeout_secs,
                    "llm fallback timed out"
                );
                None
            }
        }
    }

    /// Build the ingestion trigger and hand it to the scheduler.
    fn schedule_research(
        &self,
        request: &RivetRequest,
        intent: &Intent,
        coverage: KbCoverage,
    ) -> bool {
        let trigger = self.gap.analyze(request, intent, coverage);
        self.scheduler.trigger(trigger)
    }
}

/// Top citations from the coverage estimate.
fn artifacts_from(estimate: &CoverageEstimate) -> Vec<Artifact> {
    estimate
        .docs
        .iter()
        .filter_map(|d| {
            d.source_url.as_ref().map(|url| Artifact {
                title: Some(d.title.clone()),
                url: url.clone(),
            })
        })
        .take(MAX_ARTIFACTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;
    use url::Url;

    use rivet_research::{CandidateSource, IngestReport, IngestionPipeline, Scraper};
    use rivet_shared::{
        AgentAnswer, CoverageConfig, GapConfig, RankedDoc, ResearchConfig, RivetError, SourceKind,
    };
    use rivet_storage::MemoryFingerprintStore;

    use crate::agents::{DocFilters, KbStore, SmeAgent};

    // -- stub collaborators -------------------------------------------------

    /// KB returning a fixed number of docs per vendor (default for None).
    struct VendorKb {
        default_count: usize,
        per_vendor: Vec<(VendorTag, usize)>,
        calls: AtomicUsize,
    }

    impl VendorKb {
        fn uniform(count: usize) -> Self {
            Self {
                default_count: count,
                per_vendor: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn per_vendor(default_count: usize, per_vendor: Vec<(VendorTag, usize)>) -> Self {
            Self {
                default_count,
                per_vendor,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KbStore for VendorKb {
        async fn search_docs(&self, filters: &DocFilters) -> rivet_shared::Result<Vec<RankedDoc>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let count = filters
                .vendor
                .and_then(|v| {
                    self.per_vendor
                        .iter()
                        .find(|(vendor, _)| *vendor == v)
                        .map(|(_, c)| *c)
                })
                .unwrap_or(self.default_count);
            Ok((0..count)
                .map(|i| RankedDoc {
                    id: format!("doc-{i}"),
                    title: format!("KB article {i}"),
                    snippet: Some("check parameter p0210".into()),
                    source_url: Some(format!("https://kb.example.com/a/{i}")),
                    similarity: 0.8,
                })
                .collect())
        }
    }

    struct NamedAgent {
        name: &'static str,
        fail: bool,
    }

    impl NamedAgent {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, fail: false })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, fail: true })
        }
    }

    #[async_trait]
    impl SmeAgent for NamedAgent {
        fn id(&self) -> &str {
            self.name
        }

        async fn generate_answer(
            &self,
            _intent: &Intent,
            _docs: &[RankedDoc],
        ) -> rivet_shared::Result<AgentAnswer> {
            if self.fail {
                return Err(RivetError::SmeAgent("model endpoint unreachable".into()));
            }
            Ok(AgentAnswer {
                text: format!("{}: check the fault code table in the manual", self.name),
                confidence: 0.85,
            })
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmFallback for EchoLlm {
        async fn generate(&self, prompt: &str) -> rivet_shared::Result<String> {
            Ok(format!("llm answer for: {}", &prompt[..prompt.len().min(40)]))
        }
    }

    struct DownLlm;

    #[async_trait]
    impl LlmFallback for DownLlm {
        async fn generate(&self, _prompt: &str) -> rivet_shared::Result<String> {
            Err(RivetError::Network("llm endpoint refused connection".into()))
        }
    }

    struct EmptyScraper;

    #[async_trait]
    impl Scraper for EmptyScraper {
        async fn search(&self, _terms: &[String]) -> rivet_shared::Result<Vec<CandidateSource>> {
            Ok(Vec::new())
        }
    }

    /// Scraper that takes far longer than any acceptable response time.
    struct SlowScraper;

    #[async_trait]
    impl Scraper for SlowScraper {
        async fn search(&self, _terms: &[String]) -> rivet_shared::Result<Vec<CandidateSource>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![CandidateSource {
                url: Url::parse("https://forum.example.com/t/1").unwrap(),
                kind: SourceKind::Forum,
            }])
        }
    }

    struct NullPipeline;

    #[async_trait]
    impl IngestionPipeline for NullPipeline {
        async fn ingest(&self, _url: &Url) -> rivet_shared::Result<IngestReport> {
            Ok(IngestReport { atoms_created: 0 })
        }
    }

    // -- assembly helpers ---------------------------------------------------

    fn init_logs() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn scheduler_with(scraper: Arc<dyn Scraper>) -> ResearchScheduler {
        ResearchScheduler::new(
            scraper,
            Arc::new(MemoryFingerprintStore::new()),
            Arc::new(NullPipeline),
            &ResearchConfig::default(),
        )
    }

    fn router_with(
        kb: Arc<VendorKb>,
        fallback: Arc<dyn LlmFallback>,
        scraper: Arc<dyn Scraper>,
        sme_fails: bool,
    ) -> RequestRouter {
        let mut registry = SmeAgentRegistry::new(NamedAgent::ok("generic-sme"));
        registry.register(
            VendorTag::Siemens,
            if sme_fails {
                NamedAgent::failing("siemens-sme")
            } else {
                NamedAgent::ok("siemens-sme")
            },
        );
        registry.register(VendorTag::Abb, NamedAgent::ok("abb-sme"));

        RequestRouter::new(
            VendorDetector::new(),
            GapDetector::new(GapConfig::default()),
            CoverageEvaluator::new(kb, CoverageConfig::default()),
            registry,
            fallback,
            scheduler_with(scraper),
            RouterConfig {
                sme_timeout_secs: 1,
                ..RouterConfig::default()
            },
        )
    }

    fn router(kb: Arc<VendorKb>) -> RequestRouter {
        router_with(kb, Arc::new(EchoLlm), Arc::new(EmptyScraper), false)
    }

    // -- decision table -----------------------------------------------------

    proptest! {
        #[test]
        fn decision_table_holds(confidence in 0.0f32..=1.0, coverage_idx in 0usize..3) {
            let coverage = [KbCoverage::None, KbCoverage::Thin, KbCoverage::Strong][coverage_idx];
            let decision = decide(confidence, 0.5, coverage);

            if confidence < 0.5 {
                prop_assert_eq!(decision, RouteDecision::Clarify);
            } else {
                let expected = match coverage {
                    KbCoverage::Strong => RouteDecision::Direct,
                    KbCoverage::Thin => RouteDecision::Enrich,
                    KbCoverage::None => RouteDecision::Research,
                };
                prop_assert_eq!(decision, expected);
            }
        }
    }

    #[test]
    fn threshold_boundary_is_not_clarify() {
        // Exactly at the threshold the router proceeds.
        assert_eq!(decide(0.5, 0.5, KbCoverage::Strong), RouteDecision::Direct);
        assert_eq!(decide(0.499, 0.5, KbCoverage::Strong), RouteDecision::Clarify);
    }

    // -- end-to-end scenarios -----------------------------------------------

    #[tokio::test]
    async fn strong_coverage_routes_direct_without_research() {
        init_logs();
        let router = router(Arc::new(VendorKb::uniform(10)));
        let request = RivetRequest::new("Siemens G120C drive fault F0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Direct);
        assert_eq!(response.agent_id, "siemens-sme");
        assert!(!response.research_triggered);
        assert!(!response.degraded);
        assert!(!response.text.is_empty());
        assert!(!response.artifacts.is_empty());
        assert!(response.artifacts.len() <= 3);
        assert_eq!(response.trail.coverage, KbCoverage::Strong);
    }

    #[tokio::test]
    async fn thin_coverage_answers_and_schedules_enrichment() {
        let router = router(Arc::new(VendorKb::uniform(5)));
        let request = RivetRequest::new("Siemens G120C drive fault F0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Enrich);
        assert_eq!(response.agent_id, "siemens-sme");
        assert!(response.research_triggered);
        assert!(!response.degraded);
    }

    #[tokio::test]
    async fn no_coverage_falls_back_and_researches() {
        let router = router(Arc::new(VendorKb::uniform(0)));
        let request = RivetRequest::new("Siemens G120C drive fault F0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Research);
        assert_eq!(response.agent_id, FALLBACK_AGENT_ID);
        assert!(response.research_triggered);
        assert!(response.text.contains("10 minutes"));
        assert!(response.artifacts.is_empty());
    }

    #[tokio::test]
    async fn low_confidence_clarifies_without_touching_the_kb() {
        let kb = Arc::new(VendorKb::uniform(10));
        let router = router(kb.clone());
        let request = RivetRequest::new("why does my motor hum");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Clarify);
        assert!(!response.research_triggered);
        assert_eq!(kb.calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.trail.coverage, KbCoverage::None);
        assert!(
            response
                .trail
                .alternatives
                .iter()
                .any(|a| a.contains("not evaluated"))
        );
    }

    #[tokio::test]
    async fn sme_failure_degrades_to_llm_but_keeps_route() {
        init_logs();
        let router = router_with(
            Arc::new(VendorKb::uniform(10)),
            Arc::new(EchoLlm),
            Arc::new(EmptyScraper),
            true,
        );
        let request = RivetRequest::new("Siemens G120C drive fault F0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Direct);
        assert!(response.degraded);
        assert_eq!(response.agent_id, FALLBACK_AGENT_ID);
        assert!(!response.text.is_empty());
    }

    #[tokio::test]
    async fn total_llm_outage_still_returns_text() {
        let router = router_with(
            Arc::new(VendorKb::uniform(0)),
            Arc::new(DownLlm),
            Arc::new(EmptyScraper),
            false,
        );
        let request = RivetRequest::new("Siemens G120C drive fault F0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Research);
        assert!(response.degraded);
        assert!(!response.text.is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_the_only_error() {
        let router = router(Arc::new(VendorKb::uniform(10)));
        assert!(router.route(&RivetRequest::new("")).await.is_err());
        assert!(router.route(&RivetRequest::new("   ")).await.is_err());
        assert!(
            router
                .route(&RivetRequest::new("x".repeat(5000)))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn vendor_tie_resolves_by_kb_coverage() {
        // Both vendors match on name alias alone, so scores tie; the KB
        // has ABB material but nothing for Siemens.
        let kb = Arc::new(VendorKb::per_vendor(
            0,
            vec![(VendorTag::Siemens, 0), (VendorTag::Abb, 10)],
        ));
        let router = router(kb);
        let request = RivetRequest::new("siemens or abb drive fault f0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.agent_id, "abb-sme");
        assert!(
            response
                .trail
                .alternatives
                .iter()
                .any(|a| a.contains("tie"))
        );
    }

    #[tokio::test]
    async fn full_vendor_tie_dispatches_generic() {
        let kb = Arc::new(VendorKb::per_vendor(
            10,
            vec![(VendorTag::Siemens, 10), (VendorTag::Abb, 10)],
        ));
        let router = router(kb);
        let request = RivetRequest::new("siemens or abb drive fault f0003");

        let response = router.route(&request).await.expect("routes");

        assert_eq!(response.agent_id, "generic-sme");
        assert!(
            response
                .trail
                .alternatives
                .iter()
                .any(|a| a.contains("generic"))
        );
    }

    #[tokio::test]
    async fn response_latency_is_independent_of_research() {
        let router = router_with(
            Arc::new(VendorKb::uniform(0)),
            Arc::new(EchoLlm),
            Arc::new(SlowScraper),
            false,
        );
        let request = RivetRequest::new("Siemens G120C drive fault F0003");

        let response = tokio::time::timeout(Duration::from_secs(5), router.route(&request))
            .await
            .expect("route returns well before research finishes")
            .expect("routes");

        assert_eq!(response.route_taken, RouteDecision::Research);
        assert!(response.research_triggered);
    }
}
