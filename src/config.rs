//! Compilation settings

use std::fmt;
use std::str::FromStr;

/// What to do with a syscall the trap tables do not implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyscallFallback {
    /// Discard the arguments and return 0 without saying anything
    Allow,
    /// Same as `Allow`, but log a warning and record a diagnostic
    #[default]
    Warn,
    /// Abort compilation
    Deny,
}

impl FromStr for SyscallFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(SyscallFallback::Allow),
            "warn" => Ok(SyscallFallback::Warn),
            "deny" => Ok(SyscallFallback::Deny),
            other => Err(format!("unknown syscall fallback policy: {}", other)),
        }
    }
}

impl fmt::Display for SyscallFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyscallFallback::Allow => "allow",
            SyscallFallback::Warn => "warn",
            SyscallFallback::Deny => "deny",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Binary name of the emitted class, also passed as `argv[0]`
    pub class_name: String,
    pub source_file: Option<String>,
    pub syscall_fallback: SyscallFallback,
    /// Number of entries in the runtime file-descriptor table
    pub fd_table_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            class_name: "Main".to_string(),
            source_file: None,
            syscall_fallback: SyscallFallback::default(),
            fd_table_size: 16,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    pub fn with_syscall_fallback(mut self, policy: SyscallFallback) -> Self {
        self.syscall_fallback = policy;
        self
    }

    /// Table size, never smaller than the three standard streams
    pub fn with_fd_table_size(mut self, size: usize) -> Self {
        self.fd_table_size = size.max(3);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_parses_case_insensitively() {
        assert_eq!("DENY".parse::<SyscallFallback>().unwrap(), SyscallFallback::Deny);
        assert!("maybe".parse::<SyscallFallback>().is_err());
    }

    #[test]
    fn builder_setters() {
        let config = Config::new().with_class_name("Hello").with_fd_table_size(1);
        assert_eq!(config.class_name, "Hello");
        assert_eq!(config.fd_table_size, 3);
        assert_eq!(config.syscall_fallback, SyscallFallback::Warn);
    }
}
