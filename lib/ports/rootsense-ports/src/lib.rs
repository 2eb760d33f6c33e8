//! Ports the pipeline stages talk through.

pub mod launcher;
pub mod notification;
pub mod store;

pub use launcher::{DetachedWorker, WorkerCommand, WorkerExit, WorkerLauncher};
pub use notification::NotificationSink;
pub use store::DocumentStore;
