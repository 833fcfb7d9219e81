use thiserror::Error;

/// Failures of the import pipeline, one variant per stage.
///
/// Every variant is fatal. [`ImportError::exit_code`] gives the fixed
/// process exit code for each kind; `1` stays reserved for a remote script
/// that ran and returned nonzero.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to load config {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("cannot reach {addr}: {reason}")]
    Network { addr: String, reason: String },

    #[error("SSH authentication failed for {user}@{host}: {reason}")]
    Authentication {
        host: String,
        user: String,
        reason: String,
    },

    #[error("failed to copy {local} to {remote}: {source:#}")]
    Transfer {
        local: String,
        remote: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("remote command failed: {0}")]
    RemoteExecution(String),

    /// Writing remote output to the local terminal failed (e.g. broken pipe).
    #[error("failed to write remote output locally: {0}")]
    LocalOutput(#[source] std::io::Error),
}

impl ImportError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ImportError::Config { .. } => 2,
            ImportError::Network { .. } => 3,
            ImportError::Authentication { .. } => 4,
            ImportError::Transfer { .. } => 5,
            ImportError::RemoteExecution(_) => 6,
            ImportError::LocalOutput(_) => 7,
        }
    }
}

impl From<ssh2::Error> for ImportError {
    fn from(e: ssh2::Error) -> Self {
        ImportError::RemoteExecution(e.to_string())
    }
}
