use std::env;
use std::path::PathBuf;

use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Where log records end up
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stdout,
    /// Plain text, appended; used while the terminal UI owns stdout
    File(PathBuf),
}

pub fn setup_logger(
    level: Option<String>,
    target: LogTarget,
    filter_targets: Vec<String>,
) -> Result<(), fern::InitError> {
    let level = get_log_level(level);
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);
    let colored = matches!(target, LogTarget::Stdout);

    let dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            let ts = Local::now().to_rfc3339();
            if colored {
                out.finish(format_args!(
                    "[{} {}] {}: {}",
                    ts,
                    colors.color(record.level()),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{} {}] {}: {}",
                    ts,
                    record.level(),
                    record.target(),
                    message
                ))
            }
        })
        .level(level)
        .filter(move |metadata| {
            !filter_targets
                .iter()
                .any(|filter| metadata.target().starts_with(filter))
        });

    match target {
        LogTarget::Stdout => dispatch.chain(std::io::stdout()).apply()?,
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            dispatch.chain(fern::log_file(path)?).apply()?
        }
    }
    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Explicit level, else `RUST_LOG`, else info
pub fn get_log_level(level: Option<String>) -> LevelFilter {
    match level {
        Some(level) => parse_level(&level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_level_wins() {
        assert_eq!(get_log_level(Some("debug".into())), LevelFilter::Debug);
        assert_eq!(get_log_level(Some("WARN".into())), LevelFilter::Warn);
    }

    #[test]
    fn unknown_level_is_info() {
        assert_eq!(get_log_level(Some("chatty".into())), LevelFilter::Info);
        assert_eq!(parse_level(""), LevelFilter::Info);
    }
}
