//! Wiring between configuration, adapters and the pipeline stages.

pub mod app;
pub mod ingest;
pub mod logging;

pub use app::{CONFIG_ENV, Rootsense, default_config_path};
pub use ingest::{insert_document, parse_document, stamp_timestamp};
pub use logging::{env_filter, init_logging};
