//! Application configuration for Rivet.
//!
//! Config is TOML with one section per subsystem. Every field has a
//! default, so an empty file (or no file) yields a working configuration.
//! Runtime sub-configs are derived from [`AppConfig`] via `From`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RivetError};

// ---------------------------------------------------------------------------
// Config structs (matching rivet.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// `[router]` section.
    #[serde(default)]
    pub router: RouterConfig,

    /// `[coverage]` section.
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// `[gap]` section.
    #[serde(default)]
    pub gap: GapConfig,

    /// `[research]` section.
    #[serde(default)]
    pub research: ResearchConfig,
}

/// `[router]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Below this detection confidence the router always asks to clarify.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Timeout for a single SME agent dispatch.
    #[serde(default = "default_sme_timeout_secs")]
    pub sme_timeout_secs: u64,

    /// "Check back in N minutes" figure appended to Route C answers.
    #[serde(default = "default_research_note_minutes")]
    pub research_note_minutes: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            sme_timeout_secs: default_sme_timeout_secs(),
            research_note_minutes: default_research_note_minutes(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.5
}
fn default_sme_timeout_secs() -> u64 {
    4
}
fn default_research_note_minutes() -> u64 {
    10
}

/// `[coverage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Documents below this similarity do not count toward coverage.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,

    /// Timeout for the KB store query.
    #[serde(default = "default_kb_timeout_secs")]
    pub kb_timeout_secs: u64,

    /// Maximum documents requested from the KB store.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            similarity_floor: default_similarity_floor(),
            kb_timeout_secs: default_kb_timeout_secs(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_similarity_floor() -> f32 {
    0.35
}
fn default_kb_timeout_secs() -> u64 {
    3
}
fn default_search_limit() -> u32 {
    20
}

/// `[gap]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConfig {
    /// Minimum search terms per ingestion trigger.
    #[serde(default = "default_min_search_terms")]
    pub min_search_terms: usize,

    /// Maximum search terms per ingestion trigger.
    #[serde(default = "default_max_search_terms")]
    pub max_search_terms: usize,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_search_terms: default_min_search_terms(),
            max_search_terms: default_max_search_terms(),
        }
    }
}

fn default_min_search_terms() -> usize {
    3
}
fn default_max_search_terms() -> usize {
    8
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Maximum concurrent ingestion jobs.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Pending-trigger queue capacity; a full queue drops new triggers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Incomplete fingerprints older than this become reservable again.
    #[serde(default = "default_fingerprint_ttl_hours")]
    pub fingerprint_ttl_hours: i64,

    /// Timeout for one search-endpoint request.
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: default_worker_concurrency(),
            queue_capacity: default_queue_capacity(),
            fingerprint_ttl_hours: default_fingerprint_ttl_hours(),
            search_timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_worker_concurrency() -> usize {
    10
}
fn default_queue_capacity() -> usize {
    64
}
fn default_fingerprint_ttl_hours() -> i64 {
    24
}
fn default_search_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RivetError::config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RivetError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate(&config)?;
    Ok(config)
}

/// Reject configs that would break routing invariants.
fn validate(config: &AppConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.router.confidence_threshold) {
        return Err(RivetError::config(
            "router.confidence_threshold must be within [0, 1]",
        ));
    }
    if config.gap.min_search_terms == 0
        || config.gap.min_search_terms > config.gap.max_search_terms
    {
        return Err(RivetError::config(
            "gap.min_search_terms must be >= 1 and <= gap.max_search_terms",
        ));
    }
    if config.research.worker_concurrency == 0 {
        return Err(RivetError::config(
            "research.worker_concurrency must be >= 1",
        ));
    }
    Ok(())
}
