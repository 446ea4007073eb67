pub mod app_process;
pub mod graceful_shutdown;

pub use app_process::AppProcess;
pub use graceful_shutdown::{GracefulShutdown, ShutdownReason};
