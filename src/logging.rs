use std::{fmt::Display, str::FromStr};

use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Metadata};

/// Sets how verbose chirp's own crates are, like `debug` or `trace`
const LEVEL_VARIABLE: &str = "CHIRP_LOG_LEVEL";

/// Which records reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogFilter {
    local: LevelFilter,
}

impl LogFilter {
    /// Falls back to info when the value is missing or not a level
    fn from_setting(setting: Option<&str>) -> Self {
        let local = setting
            .and_then(|s| LevelFilter::from_str(s.trim()).ok())
            .unwrap_or(LevelFilter::Info);

        Self { local }
    }

    /// External crates are only heard from when something goes wrong
    fn allows(&self, target: &Target, level: Level) -> bool {
        match target {
            Target::External(_) => level <= Level::Warn,
            _ => level <= self.local,
        }
    }
}

pub fn init_logger() {
    let setting = std::env::var(LEVEL_VARIABLE).ok();
    let filter = LogFilter::from_setting(setting.as_deref());

    let result = fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .level(filter.local.max(LevelFilter::Warn))
        .filter(move |meta: &Metadata| filter.allows(&Target::from_str(meta.target()), meta.level()))
        .chain(std::io::stdout())
        .apply();

    if let Err(e) = result {
        eprintln!("Logging could not be initialized: {}", e);
    }
}

/// The crate a record comes from
#[derive(Debug, PartialEq, Eq)]
enum Target {
    External(String),
    Chirp,
    Server,
    Social,
    Impls,
    Core,
}

impl Target {
    fn from_str(path: &str) -> Self {
        match path.split("::").next().unwrap_or_default() {
            "chirp" => Self::Chirp,
            "chirp_core" => Self::Core,
            "chirp_impls" => Self::Impls,
            "chirp_social" => Self::Social,
            "chirp_server" => Self::Server,
            other => Self::External(other.to_string()),
        }
    }

    fn label(&self) -> ColoredString {
        match self {
            Self::External(name) => name.as_str().clear(),
            Self::Chirp => "CHIRP".bright_cyan(),
            Self::Server => "SERVER".bright_green(),
            Self::Social => "SOCIAL".bright_purple(),
            Self::Impls => "IMPLS".yellow(),
            Self::Core => "CORE".blue(),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.label(), f)
    }
}

fn level_badge(level: Level) -> ColoredString {
    match level {
        Level::Error => " ERR ".black().on_red().bold(),
        Level::Warn => " WRN ".black().on_yellow().bold(),
        Level::Info => " INF ".black().on_blue().bold(),
        Level::Debug => " DBG ".white().on_black(),
        Level::Trace => " TRC ".normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_from_module_paths() {
        assert_eq!(Target::from_str("chirp_social::korn"), Target::Social);
        assert_eq!(Target::from_str("chirp_server"), Target::Server);
        assert_eq!(Target::from_str("chirp"), Target::Chirp);
        assert_eq!(
            Target::from_str("sqlx::query"),
            Target::External("sqlx".to_string())
        );
    }

    #[test]
    fn test_filter_levels() {
        let default = LogFilter::from_setting(None);
        assert!(default.allows(&Target::Social, Level::Info));
        assert!(!default.allows(&Target::Social, Level::Debug));
        assert!(!default.allows(&Target::from_str("hyper::proto"), Level::Info));
        assert!(default.allows(&Target::from_str("sqlx::query"), Level::Warn));

        let verbose = LogFilter::from_setting(Some(" debug "));
        assert!(verbose.allows(&Target::Server, Level::Debug));
        assert!(!verbose.allows(&Target::Server, Level::Trace));
        assert!(!verbose.allows(&Target::from_str("reqwest"), Level::Debug));

        let quiet = LogFilter::from_setting(Some("error"));
        assert!(!quiet.allows(&Target::Chirp, Level::Warn));
        assert!(quiet.allows(&Target::from_str("tokio"), Level::Warn));

        assert_eq!(LogFilter::from_setting(Some("loud")), default);
    }
}
