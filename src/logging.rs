//! Logging setup for wireplan.
//!
//! The engine emits `tracing` events (target `"wireplan"`) while services
//! are registered, plans are compiled, and instances are activated. This
//! module installs a `tracing-subscriber` for applications that do not run
//! their own; enable `logging-pretty` for development output or
//! `logging-json` for log aggregation.
//!
//! # Example
//!
//! ```rust,ignore
//! use wireplan::logging::{self, LogOptions, OutputStyle};
//!
//! // Defaults: pretty output at DEBUG, all targets.
//! logging::init();
//!
//! // Or spell out what you want.
//! logging::install(LogOptions {
//!     style: OutputStyle::Json,
//!     di_only: true,
//!     ..LogOptions::default()
//! });
//! ```

use tracing::Level;

/// Output style for the bundled subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// Human-readable multi-line output (development).
    #[default]
    Pretty,
    /// Single-line output for terse terminals.
    Compact,
    /// JSON lines for log aggregation; needs the `logging-json` feature and
    /// falls back to the default formatter without it.
    Json,
}

/// Subscriber options.
///
/// Plain data with a `Default`; set the fields you care about and hand the
/// value to [`install`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Maximum level to emit.
    pub level: Level,
    /// Output style.
    pub style: OutputStyle,
    /// Restrict output to the engine's own events.
    pub di_only: bool,
    /// Annotate events with file and line.
    pub source_locations: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            style: OutputStyle::default(),
            di_only: false,
            source_locations: false,
        }
    }
}

impl LogOptions {
    /// Filter directives derived from the options. A set `RUST_LOG` wins
    /// over these.
    fn directives(&self) -> String {
        if self.di_only {
            format!("wireplan={}", self.level)
        } else {
            self.level.to_string()
        }
    }
}

/// Install a global subscriber for the given options.
///
/// Panics if a global subscriber is already set, the same way
/// `tracing_subscriber::fmt::init` does.
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn install(options: LogOptions) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.directives()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(options.source_locations)
        .with_line_number(options.source_locations);

    match options.style {
        OutputStyle::Pretty => subscriber.pretty().init(),
        OutputStyle::Compact => subscriber.compact().init(),
        OutputStyle::Json => {
            #[cfg(feature = "logging-json")]
            {
                subscriber.json().init();
            }
            #[cfg(not(feature = "logging-json"))]
            {
                subscriber.init();
            }
        }
    }
}

/// Install with defaults: pretty output at DEBUG, all targets.
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init() {
    install(LogOptions::default());
}

/// Install pretty development output.
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init_pretty() {
    install(LogOptions {
        style: OutputStyle::Pretty,
        ..LogOptions::default()
    });
}

/// Install JSON output.
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init_json() {
    install(LogOptions {
        style: OutputStyle::Json,
        ..LogOptions::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = LogOptions::default();
        assert_eq!(options.level, Level::DEBUG);
        assert_eq!(options.style, OutputStyle::Pretty);
        assert!(!options.di_only);
        assert!(!options.source_locations);
    }

    #[test]
    fn directives_scope_to_the_engine() {
        let options = LogOptions {
            level: Level::TRACE,
            di_only: true,
            ..LogOptions::default()
        };
        assert_eq!(options.directives(), "wireplan=TRACE");

        let open = LogOptions {
            level: Level::TRACE,
            ..LogOptions::default()
        };
        assert_eq!(open.directives(), "TRACE");
    }
}
