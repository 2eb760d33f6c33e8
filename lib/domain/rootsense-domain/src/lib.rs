//! Domain models and invariants.

pub mod config;
pub mod document;
pub mod insight;
pub mod records;

pub use config::{
    BoundedWorkerConfig, ConfigError, DEFAULT_HORIZON, DEFAULT_SUBJECT, DEFAULT_TRACKED_METRICS,
    LoggingConfig, NotificationChannelConfig, NotificationConfig, PipelineConfig, ReiConfig,
    RootsenseConfig, SELF_PROGRAM, SampleWindow, ServiceWorkerConfig, StoreBackend, StoreConfig,
};
pub use document::{
    Collection, Document, EXCLUDED_FIELDS, ID_FIELD, TIMESTAMP_FIELD, compare_sort_keys,
    format_timestamp, normalize_timestamp, visible_fields,
};
pub use insight::Insight;
pub use records::{MetricSample, PredictionRecord, RecordError, ScoreRecord};
