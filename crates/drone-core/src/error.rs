//! Pipeline error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The downstream (or upstream) stage hung up.
    #[error("{0} queue closed")]
    QueueClosed(&'static str),
}
