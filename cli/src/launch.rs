use std::convert::Infallible;
use std::fmt;
use std::io;
use std::io::Write;

use syscage_core::ConfigError;
use syscage_core::ConfigLayer;
use syscage_core::LaunchConfig;
use syscage_core::PolicyError;
use syscage_core::ValueError;
use syscage_core::compile;
use syscage_core::load_config_file;
use syscage_seccomp::BuildError;
use syscage_seccomp::LoadError;
use syscage_seccomp::NativeSyscallTable;
use syscage_seccomp::SeccompFilter;
use syscage_seccomp::build_filter;
use thiserror::Error;

use crate::Cli;
use crate::exec::PreparedExec;
use crate::quiesce::quiesce_runtime;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no command given")]
    MissingCommand,

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to write filter diagnostics: {0}")]
    Export(#[source] io::Error),

    #[error("{program}: command not found: {source}")]
    Path {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to execute {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::MissingCommand => 2,
            _ => 1,
        }
    }
}

/// Progress through the launch sequence. Each stage is entered only once the
/// previous one completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    RuntimeQuiesced,
    RuleSetCompiled,
    FilterBuilt,
    DiagnosticsExported,
    ExecutableResolved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::RuntimeQuiesced => "runtime quiesced",
            Stage::RuleSetCompiled => "rule set compiled",
            Stage::FilterBuilt => "filter built",
            Stage::DiagnosticsExported => "diagnostics exported",
            Stage::ExecutableResolved => "executable resolved",
        };
        f.write_str(name)
    }
}

fn reached(stage: Stage) {
    tracing::debug!("launch: {stage}");
}

/// Compile the policy, install it and replace this process with the command.
///
/// Returns only on failure. Once the filter is loaded the only thing left to
/// do is `execv`: no logging, no allocation.
pub fn launch(cli: Cli) -> Result<Infallible, LaunchError> {
    if cli.command.is_empty() {
        return Err(LaunchError::MissingCommand);
    }

    quiesce_runtime();
    reached(Stage::RuntimeQuiesced);

    let config = resolve_config(&cli)?;

    let rule_set = compile(&config.policy, &NativeSyscallTable)?;
    tracing::debug!(
        rules = rule_set.rules().len(),
        default = %rule_set.default_disposition(),
        no_new_privs = rule_set.no_new_privs(),
        "compiled policy"
    );
    reached(Stage::RuleSetCompiled);

    let filter = build_filter(rule_set, &NativeSyscallTable)?;
    reached(Stage::FilterBuilt);

    export_diagnostics(&filter, &config, &mut io::stdout().lock())?;
    reached(Stage::DiagnosticsExported);

    let prepared = PreparedExec::resolve(&cli.command)?;
    tracing::debug!(path = %prepared.path().display(), "resolved executable");
    reached(Stage::ExecutableResolved);

    filter.load()?;
    Err(prepared.exec())
}

/// Merge the config file, if any, with the command-line flags.
pub fn resolve_config(cli: &Cli) -> Result<LaunchConfig, LaunchError> {
    let mut layers: Vec<ConfigLayer> = Vec::with_capacity(2);
    if let Some(path) = &cli.config {
        tracing::debug!(path = %path.display(), "loading config file");
        layers.push(load_config_file(path)?);
    }
    layers.push(cli.config_overrides()?);
    Ok(LaunchConfig::from_layers(layers))
}

fn export_diagnostics<W: Write>(
    filter: &SeccompFilter,
    config: &LaunchConfig,
    out: &mut W,
) -> Result<(), LaunchError> {
    if config.dump_pfc {
        filter.export_pfc(out).map_err(LaunchError::Export)?;
    }
    if config.dump_bpf {
        filter.export_bpf(out).map_err(LaunchError::Export)?;
    }
    out.flush().map_err(LaunchError::Export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use syscage_core::Action;
    use syscage_core::Errno;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn missing_command_exits_with_usage_status() {
        let err = launch(cli(&["syscage", "--kill-calls", "ptrace"])).expect_err("no command");
        assert!(matches!(err, LaunchError::MissingCommand));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_command_wins_over_a_broken_config() {
        let err = launch(cli(&["syscage", "--config", "/nonexistent/syscage.yaml"]))
            .expect_err("no command");
        assert!(matches!(err, LaunchError::MissingCommand));
    }

    #[test]
    fn policy_errors_stop_before_anything_is_loaded() {
        let err = launch(cli(&[
            "syscage",
            "--allow-calls",
            "open",
            "--errno-calls",
            "open",
            "true",
        ]))
        .expect_err("duplicate");
        assert_eq!(
            err.to_string(),
            "filter generation failed: multiple rules for open"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn flags_layer_on_top_of_the_config_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "default_action: kill\nerrno: EACCES\nallow_calls: [read]\ndump_pfc: true"
        )?;
        let path = file.path().to_string_lossy().into_owned();

        let config = resolve_config(&cli(&[
            "syscage",
            "--config",
            &path,
            "--allow-calls",
            "write",
            "--default-act",
            "log",
            "true",
        ]))?;
        assert_eq!(config.policy.default_action, Action::Log);
        assert_eq!(config.policy.errno, Errno::new(13));
        assert_eq!(
            config.policy.allow_calls,
            vec!["read".to_string(), "write".to_string()]
        );
        assert!(config.dump_pfc);
        assert!(!config.dump_bpf);
        Ok(())
    }

    #[test]
    fn unreadable_config_is_a_config_error() {
        let err = resolve_config(&cli(&["syscage", "--config", "/nonexistent/syscage.yaml", "true"]))
            .expect_err("missing file");
        assert!(matches!(err, LaunchError::Config(ConfigError::Read { .. })));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn bad_flag_values_are_value_errors() {
        let err = resolve_config(&cli(&["syscage", "--errno", "EBOGUS", "true"]))
            .expect_err("unknown errno");
        assert_eq!(err.to_string(), "unknown errno value: EBOGUS");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn diagnostics_follow_the_dump_switches() -> anyhow::Result<()> {
        let config = resolve_config(&cli(&[
            "syscage",
            "--kill-calls",
            "ptrace",
            "--dump-pfc",
            "--dump-bpf",
            "true",
        ]))?;
        let rule_set = compile(&config.policy, &NativeSyscallTable)?;
        let filter = build_filter(rule_set, &NativeSyscallTable)?;

        let mut pfc_only = Vec::new();
        filter.export_pfc(&mut pfc_only)?;

        let mut out = Vec::new();
        export_diagnostics(&filter, &config, &mut out)?;
        assert!(out.starts_with(&pfc_only));
        let instructions: usize = filter.programs().iter().map(Vec::len).sum();
        assert_eq!(out.len(), pfc_only.len() + instructions * 8);

        let quiet = resolve_config(&cli(&["syscage", "true"]))?;
        let mut nothing = Vec::new();
        export_diagnostics(&filter, &quiet, &mut nothing)?;
        assert!(nothing.is_empty());
        Ok(())
    }
}
