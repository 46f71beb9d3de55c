//! Policy model for `syscage`.
//!
//! Configuration arrives in layers (built-in defaults, an optional YAML
//! file, command-line flags) and is folded into a [`LaunchConfig`]. The
//! [`compile`] step turns its [`PolicyConfig`] into a [`CompiledRuleSet`]:
//! every listed syscall mapped to exactly one [`Disposition`], or an error.
mod action;
mod compiler;
mod config;
mod errno;
mod error;

pub use action::Action;
pub use action::Disposition;
pub use compiler::CompiledRuleSet;
pub use compiler::RUNTIME_SYSCALLS;
pub use compiler::SyscallRule;
pub use compiler::SyscallTable;
pub use compiler::compile;
pub use config::ConfigLayer;
pub use config::LaunchConfig;
pub use config::PolicyConfig;
pub use config::load_config_file;
pub use errno::Errno;
pub use error::ConfigError;
pub use error::PolicyError;
pub use error::ValueError;
