use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("filter generation failed: unsupported architecture {0}")]
    UnsupportedArch(&'static str),
    #[error("filter generation failed: add rule for {0}: unknown system call")]
    UnknownSyscall(String),
    #[error("filter generation failed: add rule for {name}: syscall {nr} already has a rule")]
    DuplicateRule { name: String, nr: i64 },
    #[error("filter generation failed: {0}")]
    Engine(#[from] seccompiler::BackendError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to set no_new_privs: {0}")]
    NoNewPrivs(#[source] std::io::Error),
    #[error("failed to load seccomp filter: program has {0} instructions")]
    ProgramTooLong(usize),
    #[error("failed to load seccomp filter: {0}")]
    Install(#[source] std::io::Error),
    #[error("failed to load seccomp filter: thread {0} could not be synchronized")]
    ThreadSync(i64),
}
