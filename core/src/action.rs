use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;

use crate::errno::Errno;
use crate::error::ValueError;

/// Action tag as written on the command line or in a config file.
///
/// `Errno` carries no code of its own; the code comes from the separately
/// configured errno value, see [`Action::with_errno`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    Kill,
    Trap,
    #[default]
    Errno,
    Allow,
    Log,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Kill => "kill",
            Action::Trap => "trap",
            Action::Errno => "errno",
            Action::Allow => "allow",
            Action::Log => "log",
        }
    }

    pub const fn with_errno(self, errno: Errno) -> Disposition {
        match self {
            Action::Kill => Disposition::Kill,
            Action::Trap => Disposition::Trap,
            Action::Errno => Disposition::ReturnErrno(errno),
            Action::Allow => Disposition::Allow,
            Action::Log => Disposition::Log,
        }
    }
}

impl FromStr for Action {
    type Err = ValueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "kill" => Ok(Action::Kill),
            "trap" => Ok(Action::Trap),
            "errno" => Ok(Action::Errno),
            "allow" => Ok(Action::Allow),
            "log" => Ok(Action::Log),
            other => Err(ValueError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

/// What the kernel does when a syscall matches a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Terminate the whole process.
    Kill,
    /// Deliver `SIGSYS` to the calling thread.
    Trap,
    /// Fail the syscall with the given errno without executing it.
    ReturnErrno(Errno),
    Allow,
    /// Allow the syscall and record it in the audit log.
    Log,
}

impl Disposition {
    pub const fn action(self) -> Action {
        match self {
            Disposition::Kill => Action::Kill,
            Disposition::Trap => Action::Trap,
            Disposition::ReturnErrno(_) => Action::Errno,
            Disposition::Allow => Action::Allow,
            Disposition::Log => Action::Log,
        }
    }
}

impl Default for Disposition {
    fn default() -> Self {
        Disposition::ReturnErrno(Errno::EPERM)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::ReturnErrno(errno) => write!(f, "errno({errno})"),
            other => f.write_str(other.action().as_str()),
        }
    }
}
