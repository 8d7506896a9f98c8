//! Query analysis: vendor/equipment detection and knowledge-gap triggers.
//!
//! Both analyzers are pure — no I/O, no randomness. Identical input
//! always yields identical output, which the routing tests rely on.

mod gap;
mod vendor;

pub use gap::GapDetector;
pub use vendor::{Detection, VendorDetector};
