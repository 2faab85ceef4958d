pub mod classifier;
pub mod config;
pub mod corruption;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod rule;
pub mod rules;
pub mod scanner;
pub mod suppression;
pub mod target;

pub use config::ReporterConfig;
pub use registry::{Registry, RegistryError};
pub use report::{CrashType, ExecutorInfo, Report};
pub use reporter::{Reporter, ReporterError, is_suppressed, parse_all};
pub use target::{Target, TargetError};
