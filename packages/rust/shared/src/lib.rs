//! Shared types, error model, and configuration for pokefetch.
//!
//! This crate is the foundation depended on by all other pokefetch crates.
//! It provides:
//! - [`PokefetchError`] - the unified error type
//! - Domain types ([`Record`], [`RawRecord`], [`WorkRange`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], [`EnrichConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichConfig, EnrichPolicy, FetchConfig, PipelineConfig, RemoteConfig,
    StorageConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{LookupTarget, PokefetchError, Result};
pub use types::{AbilitySlot, NamedResource, REFERENCE_URI_SEPARATOR, RawRecord, Record, WorkRange};
