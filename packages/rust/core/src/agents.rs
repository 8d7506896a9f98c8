//! Collaborator interfaces consumed by the router, and the SME agent
//! registry.
//!
//! The KB store, SME agents, and the LLM fallback are external
//! capabilities: this crate only decides when to call them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use rivet_shared::{AgentAnswer, EquipmentTag, Intent, RankedDoc, Result, VendorTag};

// ---------------------------------------------------------------------------
// External capability traits
// ---------------------------------------------------------------------------

/// Filters for a KB document search.
#[derive(Debug, Clone, Default)]
pub struct DocFilters {
    /// Restrict to documents about this vendor.
    pub vendor: Option<VendorTag>,
    /// Restrict to documents about this equipment class.
    pub equipment: Option<EquipmentTag>,
    /// Fault codes that should boost matching documents.
    pub fault_codes: Vec<String>,
    /// The free-text query for similarity ranking.
    pub query: String,
    /// Maximum documents to return.
    pub limit: u32,
}

/// Read access to the external knowledge-base store.
#[async_trait]
pub trait KbStore: Send + Sync {
    /// Search documents matching the filters, ranked by similarity.
    async fn search_docs(&self, filters: &DocFilters) -> Result<Vec<RankedDoc>>;
}

/// A vendor/domain-specialized answer generator.
#[async_trait]
pub trait SmeAgent: Send + Sync {
    /// Stable identifier reported in responses.
    fn id(&self) -> &str;

    /// Generate an answer from the intent and retrieved documents.
    async fn generate_answer(&self, intent: &Intent, docs: &[RankedDoc]) -> Result<AgentAnswer>;
}

/// General-purpose LLM used on Routes C and D and as SME-failure fallback.
#[async_trait]
pub trait LlmFallback: Send + Sync {
    /// Generate a freeform answer for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// SmeAgentRegistry
// ---------------------------------------------------------------------------

/// Maps vendors to their specialized SME agents.
///
/// A generic agent is mandatory at construction, so `agent_for` always
/// resolves: unknown or tied vendors dispatch to the generic agent
/// rather than guessing.
pub struct SmeAgentRegistry {
    agents: HashMap<VendorTag, Arc<dyn SmeAgent>>,
    generic: Arc<dyn SmeAgent>,
}

impl SmeAgentRegistry {
    /// Create a registry with the mandatory generic agent.
    pub fn new(generic: Arc<dyn SmeAgent>) -> Self {
        Self {
            agents: HashMap::new(),
            generic,
        }
    }

    /// Register a vendor-specialized agent, replacing any previous one.
    pub fn register(&mut self, vendor: VendorTag, agent: Arc<dyn SmeAgent>) {
        self.agents.insert(vendor, agent);
    }

    /// Resolve the agent for a vendor. Never fails: unknown vendors get
    /// the generic agent.
    pub fn agent_for(&self, vendor: Option<VendorTag>) -> Arc<dyn SmeAgent> {
        vendor
            .and_then(|v| self.agents.get(&v).cloned())
            .unwrap_or_else(|| self.generic.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedAgent(&'static str);

    #[async_trait]
    impl SmeAgent for NamedAgent {
        fn id(&self) -> &str {
            self.0
        }

        async fn generate_answer(
            &self,
            _intent: &Intent,
            _docs: &[RankedDoc],
        ) -> Result<AgentAnswer> {
            Ok(AgentAnswer {
                text: format!("answer from {}", self.0),
                confidence: 0.8,
            })
        }
    }

    #[test]
    fn registry_resolves_registered_vendor() {
        let mut registry = SmeAgentRegistry::new(Arc::new(NamedAgent("generic")));
        registry.register(VendorTag::Siemens, Arc::new(NamedAgent("siemens-sme")));

        assert_eq!(
            registry.agent_for(Some(VendorTag::Siemens)).id(),
            "siemens-sme"
        );
    }

    #[test]
    fn registry_falls_back_to_generic() {
        let registry = SmeAgentRegistry::new(Arc::new(NamedAgent("generic")));

        assert_eq!(registry.agent_for(Some(VendorTag::Danfoss)).id(), "generic");
        assert_eq!(registry.agent_for(None).id(), "generic");
    }
}
