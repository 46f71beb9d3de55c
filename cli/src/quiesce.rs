use std::io;
use std::io::Write;
use std::path::Path;

/// Bring the launcher to a state where nothing else runs on its behalf.
///
/// Pending stdio is flushed, the process is pinned to the CPU it is running
/// on, and the presence of other threads is reported. None of this is fatal:
/// the filter is installed with thread synchronization, which fails loudly if
/// a stray thread cannot be covered.
pub(crate) fn quiesce_runtime() {
    if let Err(err) = flush_stdio() {
        tracing::warn!("failed to flush stdio before launch: {err}");
    }

    match pin_to_current_cpu() {
        Ok(cpu) => tracing::debug!(cpu, "pinned launcher to current cpu"),
        Err(err) => tracing::warn!("failed to pin launcher to current cpu: {err}"),
    }

    match thread_count(Path::new("/proc/self/task")) {
        Ok(1) => {}
        Ok(threads) => tracing::warn!(threads, "launcher is not single-threaded"),
        Err(err) => tracing::debug!("could not count launcher threads: {err}"),
    }
}

fn flush_stdio() -> io::Result<()> {
    io::stdout().flush()?;
    io::stderr().flush()
}

fn pin_to_current_cpu() -> io::Result<usize> {
    // SAFETY: no arguments; reports the CPU of the calling thread.
    let cpu = unsafe { libc::sched_getcpu() };
    let cpu = usize::try_from(cpu).map_err(|_| io::Error::last_os_error())?;

    // SAFETY: `cpu_set_t` is plain data; CPU_ZERO/CPU_SET only touch the set.
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
    }
    // SAFETY: `set` is a fully initialized `cpu_set_t` and the size matches.
    let result =
        unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(cpu)
}

fn thread_count(task_dir: &Path) -> io::Result<usize> {
    let mut threads = 0;
    for entry in std::fs::read_dir(task_dir)? {
        entry?;
        threads += 1;
    }
    Ok(threads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counts_task_entries() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for tid in ["100", "101", "102"] {
            std::fs::create_dir(dir.path().join(tid))?;
        }
        assert_eq!(thread_count(dir.path())?, 3);
        Ok(())
    }

    #[test]
    fn missing_task_dir_is_an_error() {
        assert!(thread_count(Path::new("/nonexistent/task")).is_err());
    }

    #[test]
    fn sees_the_test_thread() -> anyhow::Result<()> {
        assert!(thread_count(Path::new("/proc/self/task"))? >= 1);
        Ok(())
    }
}
