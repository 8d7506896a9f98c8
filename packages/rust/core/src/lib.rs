//! Rivet request-routing core.
//!
//! Wires the detection, coverage, and research crates into the four-route
//! decision pipeline:
//!
//! - **Direct** — strong KB coverage, SME agent answers from retrieved docs
//! - **Enrich** — thin coverage, answer now and densify in the background
//! - **Research** — no coverage, LLM fallback plus a full research trigger
//! - **Clarify** — detection confidence too low to route at all
//!
//! External capabilities (KB store, SME agents, the LLM) enter through the
//! traits in [`agents`]; this crate never talks to a model or database
//! directly.

pub mod agents;
pub mod coverage;
pub mod router;

pub use agents::{DocFilters, KbStore, LlmFallback, SmeAgent, SmeAgentRegistry};
pub use coverage::{CoverageEstimate, CoverageEvaluator};
pub use router::{RequestRouter, decide};

use rivet_shared::{Result, RivetRequest, RivetResponse};

/// Route a single query through the engine.
///
/// Thin wrapper over [`RequestRouter::route`] for callers that do not
/// need the router's lifecycle.
pub async fn route_query(router: &RequestRouter, request: &RivetRequest) -> Result<RivetResponse> {
    router.route(request).await
}
