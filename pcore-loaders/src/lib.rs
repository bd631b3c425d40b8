//! Lazy, cached, namespace-scoped loading of Pcore entities.
//!
//! Depend on this crate to get the whole loader subsystem. It bundles the
//! internal crates behind feature flags so embedders that bring their own
//! instantiators or logging can leave ours out.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use pcore_primitives as primitives;

/// Loader hierarchy and caching.
pub use pcore_loader as loader;

/// Settings and module metadata.
pub use pcore_config as config;

/// Concrete instantiators (enabled by `instantiators` feature).
#[cfg(feature = "instantiators")]
pub use pcore_instantiators as instantiators;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use pcore_telemetry as telemetry;

#[cfg(feature = "instantiators")]
mod bootstrap;

#[cfg(feature = "instantiators")]
pub use bootstrap::{Bootstrap, bootstrap};
