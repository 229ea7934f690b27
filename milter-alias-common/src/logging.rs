use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

use crate::error::ConfigError;

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

/// Something the MTA told us.
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

/// Something we asked the MTA to do.
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

/// Syslog severities, plus `trace` for the very chatty.
///
/// Accepts the names used by syslog (`"warning"`, `"crit"`, ...) in any case,
/// or the numeric severity `0` to `7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    #[default]
    Warning,
    Notice,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// tracing has no levels above `ERROR`, so everything from emergency to
    /// error collapses onto it; notice shares `INFO`.
    pub const fn filter(self) -> LevelFilter {
        match self {
            Self::Emergency | Self::Alert | Self::Critical | Self::Error => LevelFilter::ERROR,
            Self::Warning => LevelFilter::WARN,
            Self::Notice | Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "emergency" | "emerg" | "0" => Ok(Self::Emergency),
            "alert" | "1" => Ok(Self::Alert),
            "critical" | "crit" | "2" => Ok(Self::Critical),
            "error" | "err" | "3" => Ok(Self::Error),
            "warning" | "warn" | "4" => Ok(Self::Warning),
            "notice" | "5" => Ok(Self::Notice),
            "info" | "6" => Ok(Self::Info),
            "debug" | "7" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ConfigError::InvalidLogLevel(value.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(value: LogLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the level to log at.
///
/// An explicitly configured level wins. Otherwise `LOG_LEVEL` from the
/// environment is used, falling back to [`LogLevel::Warning`].
pub fn effective_level(configured: Option<LogLevel>) -> LogLevel {
    configured.unwrap_or_else(|| {
        std::env::var("LOG_LEVEL").map_or_else(
            |_| LogLevel::default(),
            |level| {
                level.parse().unwrap_or_else(|_| {
                    eprintln!(
                        "Invalid log level specified {level}, defaulting to {}",
                        LogLevel::default()
                    );
                    LogLevel::default()
                })
            },
        )
    })
}

/// Installs the global subscriber.
///
/// Only events from the `milter_alias*` crates are written, to stdout.
pub fn init(level: LogLevel) {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level.filter())
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("milter_alias")
                })),
        )
        .init();
}
