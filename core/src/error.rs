use std::path::PathBuf;

use thiserror::Error;

/// A scalar value (action tag or errno) that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("unknown errno value: {0}")]
    UnknownErrno(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raised while compiling a policy; no rule set is produced when this occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("filter generation failed: multiple rules for {0}")]
    Duplicate(String),
    #[error("filter generation failed: unknown system call {0}")]
    UnknownSyscall(String),
}
