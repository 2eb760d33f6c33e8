//! Pipeline stages: the REI engine, the summary notifier and the orchestrator
//! that launches them.

pub mod orchestrator;
pub mod process;
pub mod rei;
pub mod summary;

pub use orchestrator::{
    Orchestrator, PORT_ENV, PORT_PLACEHOLDER, RunReport, RunStatus, ServiceLaunch, WorkerFailure,
    WorkerKind, WorkerSpec,
};
pub use process::ProcessLauncher;
pub use rei::{
    MetricRatio, ReiComputation, ReiEngine, ReiOutcome, SkipReason, SkippedMetric, compute_rei,
    metric_ratio, score_samples,
};
pub use summary::{
    DispatchReport, INSIGHT_PLACEHOLDER, SCORE_PLACEHOLDER, SummaryDocument, SummaryNotifier,
    render_summary,
};
