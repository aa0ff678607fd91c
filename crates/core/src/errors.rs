use std::fmt;
use std::path::PathBuf;

/// Result type alias for kubeprep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kubeprep operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote command or connection failure
    #[error("{}", format_transport_error(.command, .message, .exit_code))]
    Transport {
        command: String,
        message: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Invalid or inconsistent configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// No install procedure is mapped for the host's operating system
    #[error("operating system '{os}' is not supported")]
    UnsupportedOs { os: String },

    /// Script or command template errors
    #[error("failed to render template '{name}': {message}")]
    Template { name: String, message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization/deserialization errors
    #[error("YAML error: {message}")]
    Yaml {
        message: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// An error annotated with a human readable explanation
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },

    /// A task failed on one host
    #[error("{task} failed on host {host}: {source}")]
    Host {
        task: String,
        host: String,
        #[source]
        source: Box<Error>,
    },

    /// A task failed on one or more hosts running concurrently
    #[error("{}", format_aggregate_error(.task, .failures))]
    Aggregate {
        task: String,
        failures: Vec<HostFailure>,
    },

    /// A pipeline state failed
    #[error("state '{state}' failed: {source}")]
    State {
        state: String,
        #[source]
        source: Box<Error>,
    },
}

/// One failing host inside an aggregate error
#[derive(Debug)]
pub struct HostFailure {
    pub host: String,
    pub error: Error,
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.host, self.error)
    }
}

fn format_transport_error(command: &str, message: &str, exit_code: &Option<i32>) -> String {
    let command = summarize_command(command);
    match exit_code {
        Some(code) => format!("command '{command}' failed with exit code {code}: {message}"),
        None => format!("command '{command}' failed: {message}"),
    }
}

fn format_aggregate_error(task: &str, failures: &[HostFailure]) -> String {
    let mut out = format!("{task} failed on {} host(s)", failures.len());
    for failure in failures {
        out.push_str("\n  - ");
        out.push_str(&failure.to_string());
    }
    out
}

/// Scripts are long; errors only show their first meaningful line.
fn summarize_command(command: &str) -> String {
    let mut lines = command
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    let first = lines.next().unwrap_or_default();
    if lines.next().is_some() {
        format!("{first} ...")
    } else {
        first.to_string()
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Yaml {
            message: error.to_string(),
            source: error,
        }
    }
}

impl Error {
    /// Create a transport error for a command that could not complete
    #[must_use]
    pub fn transport(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transport {
            command: command.into(),
            message: message.into(),
            exit_code: None,
            stderr: String::new(),
        }
    }

    /// Create a transport error for a command that exited non-zero
    #[must_use]
    pub fn command_failed(command: impl Into<String>, exit_code: i32, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        let message = match stderr.trim() {
            "" => "no output on stderr".to_string(),
            trimmed => trimmed.to_string(),
        };
        Error::Transport {
            command: command.into(),
            message,
            exit_code: Some(exit_code),
            stderr,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported operating system error
    #[must_use]
    pub fn unsupported_os(os: impl fmt::Display) -> Self {
        Error::UnsupportedOs { os: os.to_string() }
    }

    /// Create a template rendering error
    #[must_use]
    pub fn template(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Template {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Wrap an error with the task and host it happened on
    #[must_use]
    pub fn host(task: impl Into<String>, host: impl Into<String>, source: Error) -> Self {
        Error::Host {
            task: task.into(),
            host: host.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the pipeline state it happened in
    #[must_use]
    pub fn state(state: impl Into<String>, source: Error) -> Self {
        Error::State {
            state: state.into(),
            source: Box::new(source),
        }
    }

    /// Hosts named by this error, innermost context first.
    ///
    /// Aggregate errors list every failing host; single host errors list one.
    pub fn failed_hosts(&self) -> Vec<&str> {
        match self {
            Error::Aggregate { failures, .. } => failures.iter().map(|f| f.host.as_str()).collect(),
            Error::Host { host, .. } => vec![host.as_str()],
            Error::State { source, .. } | Error::Context { source, .. } => source.failed_hosts(),
            _ => Vec::new(),
        }
    }

    /// Whether the root cause is a transport failure
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Context { source, .. }
            | Error::Host { source, .. }
            | Error::State { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: message.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::Context {
            message: f(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_shows_first_script_line() {
        let err = Error::command_failed("# header\nset -xeu\napt-get update\n", 100, "E: boom\n");
        assert_eq!(
            err.to_string(),
            "command 'set -xeu ...' failed with exit code 100: E: boom"
        );
    }

    #[test]
    fn aggregate_error_lists_every_host() {
        let err = Error::Aggregate {
            task: "install kubeadm".to_string(),
            failures: vec![
                HostFailure {
                    host: "1/10.0.0.1".to_string(),
                    error: Error::transport("true", "connection reset"),
                },
                HostFailure {
                    host: "3/10.0.0.3".to_string(),
                    error: Error::unsupported_os("unknown"),
                },
            ],
        };

        let rendered = err.to_string();
        assert!(rendered.starts_with("install kubeadm failed on 2 host(s)"));
        assert!(rendered.contains("1/10.0.0.1: command 'true' failed: connection reset"));
        assert!(rendered.contains("3/10.0.0.3: operating system 'unknown' is not supported"));
        assert_eq!(err.failed_hosts(), vec!["1/10.0.0.1", "3/10.0.0.3"]);
    }

    #[test]
    fn context_keeps_the_root_cause() {
        let result: Result<()> = Err(Error::transport("kubeadm", "eof"));
        let err = result.context("failed to install kubeadm").unwrap_err();

        assert!(err.is_transport());
        assert!(err.to_string().starts_with("failed to install kubeadm: "));
    }

    #[test]
    fn state_error_forwards_failed_hosts() {
        let err = Error::state(
            "upload-config",
            Error::host("upload", "2/10.0.0.2", Error::configuration("missing bundle")),
        );
        assert_eq!(err.failed_hosts(), vec!["2/10.0.0.2"]);
        assert!(!err.is_transport());
    }
}
