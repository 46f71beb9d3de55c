//! Human-readable rendering of a filter, modelled on libseccomp's pseudo
//! filter code.
use std::fmt;
use std::io;
use std::io::Write;

use syscage_core::Disposition;

use crate::filter::ResolvedRule;

struct PfcAction(Disposition);

impl fmt::Display for PfcAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Disposition::Kill => f.write_str("KILL_PROCESS"),
            Disposition::Trap => f.write_str("TRAP"),
            Disposition::ReturnErrno(errno) => write!(f, "ERRNO({})", errno.code()),
            Disposition::Allow => f.write_str("ALLOW"),
            Disposition::Log => f.write_str("LOG"),
        }
    }
}

pub(crate) fn write_pfc<W: Write>(
    out: &mut W,
    arch: &str,
    rules: &[ResolvedRule],
    default: Disposition,
    no_new_privs: bool,
) -> io::Result<()> {
    writeln!(out, "#")?;
    writeln!(out, "# pseudo filter code start")?;
    writeln!(out, "#")?;
    writeln!(out, "# no_new_privs: {}", u8::from(no_new_privs))?;
    writeln!(out, "# filter for arch {arch}")?;
    writeln!(out, "if ($arch == {arch})")?;
    for rule in rules {
        writeln!(out, "  # filter for syscall \"{}\" ({})", rule.name, rule.nr)?;
        writeln!(out, "  if ($syscall == {})", rule.nr)?;
        writeln!(out, "    action {};", PfcAction(rule.disposition))?;
    }
    writeln!(out, "  # default action")?;
    writeln!(out, "  action {};", PfcAction(default))?;
    writeln!(out, "# invalid architecture action")?;
    writeln!(out, "action KILL_PROCESS;")?;
    writeln!(out, "#")?;
    writeln!(out, "# pseudo filter code end")?;
    writeln!(out, "#")?;
    Ok(())
}
