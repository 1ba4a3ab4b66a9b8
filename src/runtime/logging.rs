// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging of external `kubectl` invocations.
//!
//! Commands are logged with their arguments and exit status. Values of
//! sensitive flags (tokens, passwords) are masked before anything reaches
//! the log.
//!
//! # Example
//!
//! ```
//! use kubectl_setup::runtime::{CommandLogger, LoggingConfig, LogLevel};
//!
//! let logger = CommandLogger::with_config(
//!     LoggingConfig::new().with_command_level(LogLevel::Debug),
//! );
//!
//! let args = ["config", "set-credentials", "cluster-admin", "--token=s3cr3t"];
//! assert_eq!(
//!     logger.render(&args),
//!     "config set-credentials cluster-admin --token=****"
//! );
//! ```

use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Log level for command logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    #[default]
    Debug,
    /// Info level.
    Info,
    /// Warn level.
    Warn,
    /// Error level - only errors.
    Error,
    /// Disabled - no logging.
    Off,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

const MASK: &str = "****";

fn default_sensitive_flags() -> Vec<String> {
    vec![
        "--token".to_string(),
        "--password".to_string(),
        "--username".to_string(),
    ]
}

/// Configuration for command logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for commands and successful completions.
    pub command_level: LogLevel,
    /// Log level for failed commands.
    pub error_level: LogLevel,
    /// Whether to mask values of sensitive flags.
    pub redact_sensitive: bool,
    /// Flags whose values are masked.
    pub sensitive_flags: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            command_level: LogLevel::Debug,
            error_level: LogLevel::Error,
            redact_sensitive: true,
            sensitive_flags: default_sensitive_flags(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command log level.
    #[must_use]
    pub fn with_command_level(mut self, level: LogLevel) -> Self {
        self.command_level = level;
        self
    }

    /// Set the error log level.
    #[must_use]
    pub fn with_error_level(mut self, level: LogLevel) -> Self {
        self.error_level = level;
        self
    }

    /// Enable or disable masking.
    #[must_use]
    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redact_sensitive = enabled;
        self
    }

    /// Add a flag whose value must be masked.
    #[must_use]
    pub fn with_sensitive_flag(mut self, flag: impl Into<String>) -> Self {
        self.sensitive_flags.push(flag.into());
        self
    }

    /// Log every command at info, as build consoles show them.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            command_level: LogLevel::Info,
            ..Self::default()
        }
    }

    /// Only log failures, at warn.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            command_level: LogLevel::Off,
            error_level: LogLevel::Warn,
            ..Self::default()
        }
    }
}

fn emit(level: LogLevel, msg: &str) {
    match level {
        LogLevel::Trace => trace!(target: "kubectl_setup::kubectl", "{}", msg),
        LogLevel::Debug => debug!(target: "kubectl_setup::kubectl", "{}", msg),
        LogLevel::Info => info!(target: "kubectl_setup::kubectl", "{}", msg),
        LogLevel::Warn => warn!(target: "kubectl_setup::kubectl", "{}", msg),
        LogLevel::Error => error!(target: "kubectl_setup::kubectl", "{}", msg),
        LogLevel::Off => {}
    }
}

/// Logs external commands with timing, masking secrets.
#[derive(Debug, Clone, Default)]
pub struct CommandLogger {
    config: LoggingConfig,
}

impl CommandLogger {
    /// Create a command logger with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a command logger with custom configuration.
    #[must_use]
    pub fn with_config(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Render arguments for logging, masking sensitive values.
    ///
    /// Handles both `--flag=value` and `--flag value` forms.
    pub fn render<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut rendered = Vec::with_capacity(args.len());
        let mut mask_next = false;

        for arg in args {
            let arg = arg.as_ref();
            if mask_next {
                rendered.push(MASK.to_string());
                mask_next = false;
                continue;
            }
            if !self.config.redact_sensitive {
                rendered.push(arg.to_string());
                continue;
            }

            match arg.split_once('=') {
                Some((flag, _)) if self.is_sensitive(flag) => {
                    rendered.push(format!("{}={}", flag, MASK));
                }
                None if self.is_sensitive(arg) => {
                    rendered.push(arg.to_string());
                    mask_next = true;
                }
                _ => rendered.push(arg.to_string()),
            }
        }

        rendered.join(" ")
    }

    fn is_sensitive(&self, flag: &str) -> bool {
        self.config.sensitive_flags.iter().any(|f| f == flag)
    }

    /// Log the start of a command.
    pub fn start<S: AsRef<str>>(&self, program: &str, args: &[S]) -> CommandSpan {
        let command = format!("{} {}", program, self.render(args));
        emit(self.config.command_level, &format!("running {}", command));
        CommandSpan {
            command,
            start: Instant::now(),
        }
    }

    /// Finish a command that succeeded.
    pub fn finish_success(&self, span: CommandSpan) {
        emit(
            self.config.command_level,
            &format!("{} completed in {:?}", span.command, span.start.elapsed()),
        );
    }

    /// Finish a command that failed.
    pub fn finish_error(&self, span: CommandSpan, error: &str) {
        emit(
            self.config.error_level,
            &format!(
                "{} failed in {:?}: {}",
                span.command,
                span.start.elapsed(),
                error
            ),
        );
    }
}

/// A command in flight.
#[derive(Debug)]
pub struct CommandSpan {
    command: String,
    start: Instant,
}

impl CommandSpan {
    /// The rendered (masked) command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Get the elapsed time since the command started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "TRACE");
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Off.to_string(), "OFF");
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.command_level, LogLevel::Debug);
        assert_eq!(config.error_level, LogLevel::Error);
        assert!(config.redact_sensitive);
        assert!(config.sensitive_flags.contains(&"--token".to_string()));
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::new()
            .with_command_level(LogLevel::Trace)
            .with_error_level(LogLevel::Warn)
            .with_redaction(false)
            .with_sensitive_flag("--client-key");

        assert_eq!(config.command_level, LogLevel::Trace);
        assert_eq!(config.error_level, LogLevel::Warn);
        assert!(!config.redact_sensitive);
        assert!(config.sensitive_flags.contains(&"--client-key".to_string()));
    }

    #[test]
    fn test_logging_config_presets() {
        assert_eq!(LoggingConfig::verbose().command_level, LogLevel::Info);
        let quiet = LoggingConfig::quiet();
        assert_eq!(quiet.command_level, LogLevel::Off);
        assert_eq!(quiet.error_level, LogLevel::Warn);
    }

    #[test]
    fn test_render_masks_equals_form() {
        let logger = CommandLogger::new();
        let rendered = logger.render(&["set-credentials", "u", "--username=bob", "--password=pw"]);
        assert_eq!(rendered, "set-credentials u --username=**** --password=****");
    }

    #[test]
    fn test_render_masks_separate_value() {
        let logger = CommandLogger::new();
        let rendered = logger.render(&["--token", "s3cr3t", "--server=https://x"]);
        assert_eq!(rendered, "--token **** --server=https://x");
    }

    #[test]
    fn test_render_without_redaction() {
        let logger = CommandLogger::with_config(LoggingConfig::new().with_redaction(false));
        assert_eq!(logger.render(&["--token=s3cr3t"]), "--token=s3cr3t");
    }

    #[test]
    fn test_command_span() {
        let logger = CommandLogger::with_config(LoggingConfig::quiet());
        let span = logger.start("kubectl", &["config", "current-context"]);

        assert_eq!(span.command(), "kubectl config current-context");
        assert!(span.elapsed() < std::time::Duration::from_secs(1));
        logger.finish_error(span, "exit code 1");
    }
}
