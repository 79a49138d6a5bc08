pub mod app;
pub mod config;
pub mod domain;
pub mod host;
pub mod infra;

pub use crate::app::coordinator::{Coordinator, CoordinatorHandle, Intent};
pub use crate::config::EngineConfig;
pub use crate::host::{HostRuntime, Presenter};
pub use crate::infra::store::ReportStore;
