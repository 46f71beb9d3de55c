//! Seccomp backend for `syscage`.
//!
//! Syscall names are resolved with the native syscall table and compiled to
//! classic BPF with `seccompiler`. The resulting [`SeccompFilter`] can be
//! exported for inspection any number of times, then loaded exactly once.
//! Linux only.
mod error;
mod filter;
mod pfc;
mod table;

pub use error::BuildError;
pub use error::LoadError;
pub use filter::FilterBuilder;
pub use filter::SeccompFilter;
pub use filter::build_filter;
pub use table::NativeSyscallTable;
