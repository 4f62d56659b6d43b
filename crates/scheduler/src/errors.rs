use std::path::PathBuf;

use thiserror::Error;

/// Failures reading, writing or mutating the queue file.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue file could not be read or written.
    #[error("Queue file {path} could not be accessed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The queue file exists but is not a valid queue document.
    #[error("Queue file {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The in-memory queue could not be encoded.
    #[error("Queue could not be serialized: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// A task was submitted with a blank prompt.
    #[error("Cannot queue an empty prompt")]
    EmptyPrompt,
}
