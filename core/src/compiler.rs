use std::collections::HashSet;

use crate::action::Disposition;
use crate::config::PolicyConfig;
use crate::error::PolicyError;

/// Syscalls the launcher itself may still issue after the filter is loaded
/// and before `execve` replaces it: lock waits on stdio, signal delivery and
/// mask changes, yielding, and exiting when the exec fails. They are allowed
/// unless the policy says otherwise for the same name.
pub const RUNTIME_SYSCALLS: &[&str] = &[
    "exit",
    "exit_group",
    "futex",
    "restart_syscall",
    "rt_sigprocmask",
    "rt_sigreturn",
    "sched_yield",
];

/// Name table of the filter engine for the architecture being targeted.
pub trait SyscallTable {
    /// Syscall number for `name`, or `None` if the architecture has no such
    /// call. `name` is already lower-cased.
    fn resolve(&self, name: &str) -> Option<i64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallRule {
    pub name: String,
    pub disposition: Disposition,
}

impl SyscallRule {
    fn new(name: impl Into<String>, disposition: Disposition) -> Self {
        Self {
            name: name.into(),
            disposition,
        }
    }
}

/// Conflict-free, validated rules ready to be handed to the filter engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRuleSet {
    rules: Vec<SyscallRule>,
    default_disposition: Disposition,
    no_new_privs: bool,
}

impl CompiledRuleSet {
    pub fn rules(&self) -> &[SyscallRule] {
        &self.rules
    }

    pub fn default_disposition(&self) -> Disposition {
        self.default_disposition
    }

    pub fn no_new_privs(&self) -> bool {
        self.no_new_privs
    }

    #[cfg(test)]
    fn disposition_of(&self, name: &str) -> Option<Disposition> {
        self.rules
            .iter()
            .find(|rule| rule.name == name)
            .map(|rule| rule.disposition)
    }

    pub fn into_parts(self) -> (Vec<SyscallRule>, Disposition, bool) {
        (self.rules, self.default_disposition, self.no_new_privs)
    }
}

/// Turn a resolved policy into an ordered rule set.
///
/// Names are compared case-insensitively. A name listed under more than one
/// action, or unknown to `table`, fails the whole compilation.
pub fn compile(
    config: &PolicyConfig,
    table: &impl SyscallTable,
) -> Result<CompiledRuleSet, PolicyError> {
    let partitions: [(&[String], Disposition); 5] = [
        (config.kill_calls.as_slice(), Disposition::Kill),
        (config.trap_calls.as_slice(), Disposition::Trap),
        (
            config.errno_calls.as_slice(),
            Disposition::ReturnErrno(config.errno),
        ),
        (config.allow_calls.as_slice(), Disposition::Allow),
        (config.log_calls.as_slice(), Disposition::Log),
    ];

    let mut assigned: HashSet<String> = HashSet::new();
    let mut rules = Vec::new();

    for (names, disposition) in partitions {
        for name in names {
            let name = name.to_ascii_lowercase();
            if assigned.contains(&name) {
                return Err(PolicyError::Duplicate(name));
            }
            if table.resolve(&name).is_none() {
                return Err(PolicyError::UnknownSyscall(name));
            }
            assigned.insert(name.clone());
            rules.push(SyscallRule::new(name, disposition));
        }
    }

    for name in RUNTIME_SYSCALLS {
        if assigned.contains(*name) {
            continue;
        }
        if table.resolve(name).is_none() {
            tracing::debug!(
                syscall = *name,
                "runtime syscall not available on this architecture"
            );
            continue;
        }
        rules.push(SyscallRule::new(*name, Disposition::Allow));
    }

    Ok(CompiledRuleSet {
        rules,
        default_disposition: config.default_disposition(),
        no_new_privs: !config.permit_escalation,
    })
}
