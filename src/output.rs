use std::io::Write;

/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so that
/// interactive runs and cron runs share one code path.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "Updating web...")
    fn status(&self, message: &str);

    /// Success message (e.g., "Updated web: 2 service(s) healthy")
    fn success(&self, message: &str);

    /// Warning message (e.g., "Project name 'web' is also used by /srv/web")
    fn warning(&self, message: &str);

    /// Error message (e.g., "Update of web failed")
    fn error(&self, message: &str);

    /// Inline progress (no trailing newline). Call `finish_progress` after.
    fn progress(&self, message: &str);

    /// Finish an inline progress line with a result.
    fn finish_progress(&self, result: &str);

    /// A blank line separator.
    fn blank(&self);
}

/// Terminal output on stdout/stderr.
///
/// Interactive use gets ANSI colors. Scheduled runs append to
/// `scheduler.log`, so they get plain lines stamped with the local time
/// instead.
pub struct Console {
    interactive: bool,
}

impl Console {
    pub fn interactive() -> Self {
        Self { interactive: true }
    }

    pub fn scheduled() -> Self {
        Self { interactive: false }
    }

    fn line(&self, color: &str, message: &str) -> String {
        if self.interactive {
            if color.is_empty() {
                message.to_string()
            } else {
                format!("\x1b[{}m{}\x1b[0m", color, message)
            }
        } else {
            format!(
                "[{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                message
            )
        }
    }
}

impl UserOutput for Console {
    fn status(&self, message: &str) {
        println!("{}", self.line("", message));
    }

    fn success(&self, message: &str) {
        println!("{}", self.line("32", message));
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", self.line("33", message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", self.line("31", message));
    }

    fn progress(&self, message: &str) {
        print!("{}", self.line("", message));
        std::io::stdout().flush().ok();
    }

    fn finish_progress(&self, result: &str) {
        println!("{}", result);
    }

    fn blank(&self) {
        println!();
    }
}
