//! Layered configuration.
//!
//! A [`LaunchConfig`] is produced once, by folding [`ConfigLayer`]s over the
//! built-in defaults. Scalars are last-write-wins; the five syscall lists are
//! concatenated across layers.
use std::path::Path;

use serde::Deserialize;

use crate::action::Action;
use crate::action::Disposition;
use crate::errno::Errno;
use crate::error::ConfigError;

/// The syscall policy, fully resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    /// When false the filter sets `no_new_privs`.
    pub permit_escalation: bool,
    pub kill_calls: Vec<String>,
    pub trap_calls: Vec<String>,
    pub errno_calls: Vec<String>,
    pub allow_calls: Vec<String>,
    pub log_calls: Vec<String>,
    pub default_action: Action,
    /// Return code for `errno` rules, including an `errno` default action.
    pub errno: Errno,
}

impl PolicyConfig {
    pub fn default_disposition(&self) -> Disposition {
        self.default_action.with_errno(self.errno)
    }
}

/// Everything the launcher needs to know before it starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchConfig {
    pub policy: PolicyConfig,
    /// Print the filter as pseudo filter code before loading it.
    pub dump_pfc: bool,
    /// Print the raw BPF programs before loading them.
    pub dump_bpf: bool,
}

impl LaunchConfig {
    pub fn from_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let mut config = Self::default();
        for layer in layers {
            config.apply(layer);
        }
        config
    }

    fn apply(&mut self, layer: ConfigLayer) {
        let ConfigLayer {
            permit_escalation,
            kill_calls,
            trap_calls,
            errno_calls,
            allow_calls,
            log_calls,
            default_action,
            errno,
            dump_pfc,
            dump_bpf,
        } = layer;
        let policy = &mut self.policy;

        if let Some(permit_escalation) = permit_escalation {
            policy.permit_escalation = permit_escalation;
        }
        policy.kill_calls.extend(kill_calls);
        policy.trap_calls.extend(trap_calls);
        policy.errno_calls.extend(errno_calls);
        policy.allow_calls.extend(allow_calls);
        policy.log_calls.extend(log_calls);
        if let Some(default_action) = default_action {
            policy.default_action = default_action;
        }
        if let Some(errno) = errno {
            policy.errno = errno;
        }
        if let Some(dump_pfc) = dump_pfc {
            self.dump_pfc = dump_pfc;
        }
        if let Some(dump_bpf) = dump_bpf {
            self.dump_bpf = dump_bpf;
        }
    }
}

/// One configuration source: a config file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub permit_escalation: Option<bool>,
    #[serde(default)]
    pub kill_calls: Vec<String>,
    #[serde(default)]
    pub trap_calls: Vec<String>,
    #[serde(default)]
    pub errno_calls: Vec<String>,
    #[serde(default)]
    pub allow_calls: Vec<String>,
    #[serde(default)]
    pub log_calls: Vec<String>,
    #[serde(alias = "default_act")]
    pub default_action: Option<Action>,
    pub errno: Option<Errno>,
    pub dump_pfc: Option<bool>,
    pub dump_bpf: Option<bool>,
}

/// Read a YAML config file. Unrecognised keys are an error.
pub fn load_config_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(contents: &str) -> Result<ConfigLayer, serde_yaml::Error> {
    // An empty document (or one holding only comments) is an empty mapping.
    let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    if value.is_null() {
        return Ok(ConfigLayer::default());
    }
    serde_yaml::from_value(value)
}
