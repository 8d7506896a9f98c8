//! Shared types, error model, and configuration for Rivet.
//!
//! This crate is the foundation depended on by all other Rivet crates.
//! It provides:
//! - [`RivetError`] — the unified error type
//! - Domain types ([`Intent`], [`RouteDecision`], [`IngestionTrigger`],
//!   [`SourceFingerprint`], [`RivetRequest`], [`RivetResponse`])
//! - Configuration ([`AppConfig`] and its runtime sub-configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CoverageConfig, GapConfig, ResearchConfig, RouterConfig, load_config_from,
};
pub use error::{Result, RivetError};
pub use types::{
    AgentAnswer, Artifact, DecisionTrail, EquipmentTag, IngestionTrigger, Intent, KbCoverage,
    Priority, RankedDoc, RivetRequest, RivetResponse, RouteDecision, SourceFingerprint,
    SourceKind, VendorTag,
};
