use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::io::Write;

use seccompiler::BpfProgram;
use seccompiler::SeccompAction;
use seccompiler::SeccompRule;
use seccompiler::TargetArch;
use syscage_core::CompiledRuleSet;
use syscage_core::Disposition;
use syscage_core::SyscallTable;

use crate::error::BuildError;
use crate::error::LoadError;
use crate::pfc::write_pfc;

/// Build a loadable filter from a compiled rule set.
pub fn build_filter(
    rule_set: CompiledRuleSet,
    table: &impl SyscallTable,
) -> Result<SeccompFilter, BuildError> {
    let (rules, default_disposition, no_new_privs) = rule_set.into_parts();

    let mut builder = FilterBuilder::new(default_disposition)?;
    builder.set_no_new_privs(no_new_privs);
    for rule in rules {
        builder.add_rule(&rule.name, rule.disposition, table)?;
    }
    builder.build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedRule {
    pub(crate) name: String,
    pub(crate) nr: i64,
    pub(crate) disposition: Disposition,
}

/// A filter under construction.
#[derive(Debug)]
pub struct FilterBuilder {
    arch: &'static str,
    default_disposition: Disposition,
    no_new_privs: bool,
    rules: Vec<ResolvedRule>,
}

impl FilterBuilder {
    /// Start a filter whose catch-all action is `default_disposition`.
    ///
    /// `no_new_privs` is on until [`FilterBuilder::set_no_new_privs`] says
    /// otherwise.
    pub fn new(default_disposition: Disposition) -> Result<Self, BuildError> {
        target_arch()?;
        Ok(Self {
            arch: std::env::consts::ARCH,
            default_disposition,
            no_new_privs: true,
            rules: Vec::new(),
        })
    }

    pub fn set_no_new_privs(&mut self, enabled: bool) {
        self.no_new_privs = enabled;
    }

    pub fn add_rule(
        &mut self,
        name: &str,
        disposition: Disposition,
        table: &impl SyscallTable,
    ) -> Result<(), BuildError> {
        let nr = table
            .resolve(name)
            .ok_or_else(|| BuildError::UnknownSyscall(name.to_string()))?;
        if self.rules.iter().any(|rule| rule.nr == nr) {
            return Err(BuildError::DuplicateRule {
                name: name.to_string(),
                nr,
            });
        }
        self.rules.push(ResolvedRule {
            name: name.to_string(),
            nr,
            disposition,
        });
        Ok(())
    }

    /// Compile the rules into BPF.
    ///
    /// A seccompiler filter has a single match action, so the rules become a
    /// stack of programs: one per non-allow disposition (matching syscalls
    /// get that disposition, the rest are allowed) and a catch-all that
    /// allows every listed syscall and applies the default to everything
    /// else. The kernel runs every installed program and keeps the most
    /// restrictive verdict, which is exactly the rule's disposition for a
    /// listed syscall and the default for the rest.
    pub fn build(self) -> Result<SeccompFilter, BuildError> {
        let mut groups: Vec<(Disposition, BTreeMap<i64, Vec<SeccompRule>>)> = Vec::new();
        for rule in &self.rules {
            if rule.disposition == Disposition::Allow {
                continue;
            }
            match groups
                .iter_mut()
                .find(|(disposition, _)| *disposition == rule.disposition)
            {
                Some((_, syscalls)) => {
                    syscalls.insert(rule.nr, Vec::new());
                }
                None => {
                    let mut syscalls = BTreeMap::new();
                    syscalls.insert(rule.nr, Vec::new());
                    groups.push((rule.disposition, syscalls));
                }
            }
        }

        let mut programs = Vec::with_capacity(groups.len() + 1);
        for (disposition, syscalls) in groups {
            programs.push(compile_program(
                syscalls,
                SeccompAction::Allow,
                seccomp_action(disposition),
            )?);
        }

        if self.default_disposition != Disposition::Allow {
            let listed = self.rules.iter().map(|rule| (rule.nr, Vec::new())).collect();
            programs.push(compile_program(
                listed,
                seccomp_action(self.default_disposition),
                SeccompAction::Allow,
            )?);
        }

        tracing::debug!(
            rules = self.rules.len(),
            programs = programs.len(),
            "compiled seccomp filter"
        );

        Ok(SeccompFilter {
            arch: self.arch,
            default_disposition: self.default_disposition,
            no_new_privs: self.no_new_privs,
            rules: self.rules,
            programs,
        })
    }
}

/// A compiled filter, ready to be exported or loaded.
pub struct SeccompFilter {
    arch: &'static str,
    default_disposition: Disposition,
    no_new_privs: bool,
    rules: Vec<ResolvedRule>,
    programs: Vec<BpfProgram>,
}

impl SeccompFilter {
    pub fn programs(&self) -> &[BpfProgram] {
        &self.programs
    }

    pub fn no_new_privs(&self) -> bool {
        self.no_new_privs
    }

    /// Write the filter as pseudo filter code.
    pub fn export_pfc<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_pfc(
            out,
            self.arch,
            &self.rules,
            self.default_disposition,
            self.no_new_privs,
        )
    }

    /// Write the raw `sock_filter` records of every program, in load order
    /// and native byte order.
    pub fn export_bpf<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for program in &self.programs {
            for insn in program {
                out.write_all(&insn.code.to_ne_bytes())?;
                out.write_all(&[insn.jt, insn.jf])?;
                out.write_all(&insn.k.to_ne_bytes())?;
            }
        }
        Ok(())
    }

    /// Install the filter for this process and every process it creates.
    ///
    /// This cannot be undone. The filter is consumed so nothing can touch it
    /// afterwards.
    pub fn load(self) -> Result<(), LoadError> {
        // Convert everything up front: once the first program is installed
        // the policy may forbid the syscalls an allocation needs.
        let mut kernel_programs = self
            .programs
            .iter()
            .map(to_kernel_program)
            .collect::<Vec<_>>();
        let mut fprogs = Vec::with_capacity(kernel_programs.len());
        for instructions in &mut kernel_programs {
            let len = u16::try_from(instructions.len())
                .map_err(|_| LoadError::ProgramTooLong(instructions.len()))?;
            fprogs.push(libc::sock_fprog {
                len,
                filter: instructions.as_mut_ptr(),
            });
        }

        if self.no_new_privs {
            set_no_new_privs()?;
        }
        for fprog in &fprogs {
            install_program(fprog)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SeccompFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeccompFilter")
            .field("arch", &self.arch)
            .field("default_disposition", &self.default_disposition)
            .field("no_new_privs", &self.no_new_privs)
            .field("rules", &self.rules)
            .field("programs", &self.programs.len())
            .finish()
    }
}

fn target_arch() -> Result<TargetArch, BuildError> {
    if cfg!(target_arch = "x86_64") {
        Ok(TargetArch::x86_64)
    } else if cfg!(target_arch = "aarch64") {
        Ok(TargetArch::aarch64)
    } else {
        Err(BuildError::UnsupportedArch(std::env::consts::ARCH))
    }
}

fn seccomp_action(disposition: Disposition) -> SeccompAction {
    match disposition {
        Disposition::Kill => SeccompAction::KillProcess,
        Disposition::Trap => SeccompAction::Trap,
        // The kernel keeps the low 16 bits; negative codes wrap like they do
        // in libseccomp.
        Disposition::ReturnErrno(errno) => SeccompAction::Errno(u32::from(errno.code() as u16)),
        Disposition::Allow => SeccompAction::Allow,
        Disposition::Log => SeccompAction::Log,
    }
}

fn compile_program(
    syscalls: BTreeMap<i64, Vec<SeccompRule>>,
    mismatch_action: SeccompAction,
    match_action: SeccompAction,
) -> Result<BpfProgram, BuildError> {
    let filter =
        seccompiler::SeccompFilter::new(syscalls, mismatch_action, match_action, target_arch()?)?;
    let program: BpfProgram = filter.try_into()?;
    Ok(program)
}

fn to_kernel_program(program: &BpfProgram) -> Vec<libc::sock_filter> {
    program
        .iter()
        .map(|insn| libc::sock_filter {
            code: insn.code,
            jt: insn.jt,
            jf: insn.jf,
            k: insn.k,
        })
        .collect()
}

/// Enable `PR_SET_NO_NEW_PRIVS`. Without it the kernel only accepts a filter
/// from a caller holding `CAP_SYS_ADMIN`.
fn set_no_new_privs() -> Result<(), LoadError> {
    // SAFETY: PR_SET_NO_NEW_PRIVS takes only integer arguments.
    let result = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if result != 0 {
        return Err(LoadError::NoNewPrivs(io::Error::last_os_error()));
    }
    Ok(())
}

fn install_program(fprog: &libc::sock_fprog) -> Result<(), LoadError> {
    // SAFETY: `fprog` points at instructions owned by the caller for the
    // duration of the call.
    let result = unsafe {
        libc::syscall(
            libc::SYS_seccomp,
            libc::SECCOMP_SET_MODE_FILTER,
            libc::SECCOMP_FILTER_FLAG_TSYNC,
            fprog as *const libc::sock_fprog,
        )
    };
    match result {
        0 => Ok(()),
        // With TSYNC a positive return is the id of a thread that could not
        // be synchronized.
        tid if tid > 0 => Err(LoadError::ThreadSync(tid)),
        _ => Err(LoadError::Install(io::Error::last_os_error())),
    }
}
