use syscage_core::SyscallTable;
use syscalls::Sysno;

/// Syscall names of the architecture this binary was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSyscallTable;

impl SyscallTable for NativeSyscallTable {
    fn resolve(&self, name: &str) -> Option<i64> {
        name.parse::<Sysno>().ok().map(|sysno| i64::from(sysno.id()))
    }
}
