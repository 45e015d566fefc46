use std::fmt;
use std::process::Output;
use std::time::Duration;

/// Longest stderr excerpt kept in an error. Compose can print pages of
/// progress output before the line that matters, which is usually last.
const STDERR_EXCERPT: usize = 2000;

/// Failure of an external `docker` / compose invocation.
#[derive(Debug)]
pub enum DockerError {
    /// The command did not finish within its deadline.
    TimedOut { command: String, after: Duration },

    /// The command ran and exited non-zero.
    Failed {
        command: String,
        stderr: String,
        code: Option<i32>,
    },

    /// The binary could not be started at all.
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The daemon does not know the container or image.
    NoSuchObject { object: String },

    /// Exit 0, but stdout was not what we asked for.
    Unparseable { command: String, detail: String },
}

impl DockerError {
    pub fn timed_out(command: impl Into<String>, after: Duration) -> Self {
        DockerError::TimedOut {
            command: command.into(),
            after,
        }
    }

    /// Classify a non-zero exit from its stderr.
    pub fn from_output(command: impl Into<String>, object: &str, output: &Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such object") || stderr.contains("No such container") {
            return DockerError::NoSuchObject {
                object: object.to_string(),
            };
        }
        DockerError::Failed {
            command: command.into(),
            stderr: excerpt(stderr.trim()),
            code: output.status.code(),
        }
    }

    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        DockerError::Spawn {
            command: command.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DockerError::NoSuchObject { .. })
    }
}

/// Keep the tail of long stderr output.
fn excerpt(stderr: &str) -> String {
    let count = stderr.chars().count();
    if count <= STDERR_EXCERPT {
        return stderr.to_string();
    }
    let tail: String = stderr.chars().skip(count - STDERR_EXCERPT).collect();
    format!("...{}", tail)
}

impl fmt::Display for DockerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerError::TimedOut { command, after } => {
                write!(f, "'{}' gave no result after {}s", command, after.as_secs())
            }
            DockerError::Failed {
                command,
                stderr,
                code: Some(code),
            } => write!(f, "'{}' exited with {}: {}", command, code, stderr),
            DockerError::Failed {
                command,
                stderr,
                code: None,
            } => write!(f, "'{}' was killed by a signal: {}", command, stderr),
            DockerError::Spawn { command, source } => {
                write!(f, "Could not start '{}': {}", command, source)
            }
            DockerError::NoSuchObject { object } => write!(f, "No such container or image: {}", object),
            DockerError::Unparseable { command, detail } => {
                write!(f, "Could not read the output of '{}': {}", command, detail)
            }
        }
    }
}

impl std::error::Error for DockerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DockerError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn failed_exit_reports_code_and_stderr() {
        let err = DockerError::from_output("docker tag a b", "a", &output(1, "bad reference\n"));
        assert_eq!(err.to_string(), "'docker tag a b' exited with 1: bad reference");
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_object_is_recognized() {
        let err = DockerError::from_output(
            "docker inspect 4f1c",
            "4f1c",
            &output(1, "Error: No such object: 4f1c"),
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("4f1c"));
    }

    #[test]
    fn long_stderr_keeps_the_tail() {
        let noisy = format!("{}final error", "x".repeat(5000));
        let err = DockerError::from_output("docker compose pull", "", &output(18, &noisy));
        let text = err.to_string();
        assert!(text.ends_with("final error"));
        assert!(text.len() < 2100);
    }

    #[test]
    fn spawn_failure_exposes_source() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "docker: not found");
        let err = DockerError::spawn("docker inspect x", io);
        assert!(err.source().is_some());
    }
}
