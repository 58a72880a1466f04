use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("{program} timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("{program} exited with {code:?}: {output}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{0} is not supported on this host")]
    Unsupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ActuatorError {
    fn from(err: std::io::Error) -> Self {
        ActuatorError::Other(err.into())
    }
}
