//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod log;
pub mod market;
pub mod overrides;
pub mod resolver;
pub mod ticker;
pub mod valuation;

// Re-export main types for cleaner imports
pub use overrides::OverridesStore;
pub use ticker::Ticker;
pub use valuation::{Valuation, ValuationEngine, ValuationReport, ValuationRow};
