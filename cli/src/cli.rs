use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use syscage_core::Action;
use syscage_core::ConfigLayer;
use syscage_core::Errno;
use syscage_core::ValueError;

/// Run a command under a seccomp syscall filter.
///
/// Every syscall not named in one of the lists gets the default action.
/// List options take comma-separated syscall names and may be repeated.
#[derive(Debug, Parser)]
#[command(name = "syscage", version)]
pub struct Cli {
    /// Load options from a YAML configuration file. Flags are applied on top
    /// of it; syscall lists from both are combined.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not set the 'no new privileges' bit.
    #[arg(long = "permit-escalation", default_value_t = false)]
    pub permit_escalation: bool,

    /// Syscalls that kill the process.
    #[arg(long = "kill-calls", value_name = "CALLS", value_delimiter = ',')]
    pub kill_calls: Vec<String>,

    /// Syscalls that send SIGSYS to the caller.
    #[arg(long = "trap-calls", value_name = "CALLS", value_delimiter = ',')]
    pub trap_calls: Vec<String>,

    /// Syscalls that fail with the configured errno.
    #[arg(long = "errno-calls", value_name = "CALLS", value_delimiter = ',')]
    pub errno_calls: Vec<String>,

    /// Syscalls allowed without restriction.
    #[arg(long = "allow-calls", value_name = "CALLS", value_delimiter = ',')]
    pub allow_calls: Vec<String>,

    /// Syscalls allowed and recorded in the audit log.
    #[arg(long = "log-calls", value_name = "CALLS", value_delimiter = ',')]
    pub log_calls: Vec<String>,

    /// Action for every other syscall: kill, trap, errno, allow or log.
    #[arg(long = "default-act", value_name = "ACTION")]
    pub default_act: Option<String>,

    /// Error returned by the errno action, by name (EPERM, eacces, notsup)
    /// or number.
    #[arg(long = "errno", value_name = "ERRNO")]
    pub errno: Option<String>,

    /// Print the generated filter as pseudo filter code to stdout.
    #[arg(long = "dump-pfc", default_value_t = false)]
    pub dump_pfc: bool,

    /// Print the generated BPF programs to stdout.
    #[arg(long = "dump-bpf", default_value_t = false)]
    pub dump_bpf: bool,

    /// Command to run, followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// The flags as a configuration layer, applied after the config file.
    pub fn config_overrides(&self) -> Result<ConfigLayer, ValueError> {
        Ok(ConfigLayer {
            permit_escalation: self.permit_escalation.then_some(true),
            kill_calls: self.kill_calls.clone(),
            trap_calls: self.trap_calls.clone(),
            errno_calls: self.errno_calls.clone(),
            allow_calls: self.allow_calls.clone(),
            log_calls: self.log_calls.clone(),
            default_action: self
                .default_act
                .as_deref()
                .map(str::parse::<Action>)
                .transpose()?,
            errno: self.errno.as_deref().map(str::parse::<Errno>).transpose()?,
            dump_pfc: self.dump_pfc.then_some(true),
            dump_bpf: self.dump_bpf.then_some(true),
        })
    }
}
