use std::ffi::CString;
use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use crate::launch::LaunchError;

/// Everything `execv` needs, converted before the filter is loaded so the
/// handoff itself does not allocate.
#[derive(Debug)]
pub(crate) struct PreparedExec {
    path: PathBuf,
    // Display form of `path`, used for the error if `execv` returns.
    program: String,
    c_path: CString,
    // Keeps the pointers in `argv_ptrs` alive.
    _argv: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
}

impl PreparedExec {
    /// Resolve `command[0]` against `PATH` and convert the argument vector.
    /// `argv[0]` is passed on as the user wrote it.
    pub(crate) fn resolve(command: &[OsString]) -> Result<Self, LaunchError> {
        let Some(program) = command.first() else {
            return Err(LaunchError::MissingCommand);
        };
        let path = which::which(program).map_err(|source| LaunchError::Path {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;

        let program = path.display().to_string();
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| LaunchError::Exec {
            program: program.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"),
        })?;
        let argv = command
            .iter()
            .map(|arg| {
                CString::new(arg.clone().into_vec()).map_err(|_| LaunchError::Exec {
                    program: program.clone(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "argument contains a NUL byte",
                    ),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut argv_ptrs: Vec<*const libc::c_char> =
            argv.iter().map(|arg| arg.as_ptr()).collect();
        argv_ptrs.push(std::ptr::null());

        Ok(Self {
            path,
            program,
            c_path,
            _argv: argv,
            argv_ptrs,
        })
    }

    pub(crate) fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Replace the current process image. Returns only on failure, without
    /// allocating: the filter may already forbid growing the heap.
    pub(crate) fn exec(self) -> LaunchError {
        // SAFETY: `c_path` and every pointer in `argv_ptrs` point into
        // CStrings owned by `self`, and `argv_ptrs` is null-terminated.
        unsafe {
            libc::execv(self.c_path.as_ptr(), self.argv_ptrs.as_ptr());
        }
        // Capture errno before anything else can clobber it.
        let source = io::Error::last_os_error();
        LaunchError::Exec {
            program: self.program,
            source,
        }
    }
}
