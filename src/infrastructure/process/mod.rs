//! OS process adapter.

pub mod tokio_launcher;

pub use tokio_launcher::{TokioProcessHandle, TokioProcessLauncher};
