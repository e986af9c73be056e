//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format confidence as percentage
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Format a pump duration, e.g. `2m 15s`
pub fn format_duration(seconds: u32) -> String {
    if seconds >= 60 {
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Color a water quality label
pub fn color_label(label: &str) -> String {
    match label {
        "EXCELLENT" => label.green().bold().to_string(),
        "GOOD" => label.green().to_string(),
        "POOR" => label.red().bold().to_string(),
        _ => label.yellow().to_string(),
    }
}

/// Color a pump action
pub fn color_action(action: &str) -> String {
    match action {
        "PUMP_ON" => action.red().bold().to_string(),
        "PUMP_OFF" => action.green().to_string(),
        _ => action.to_string(),
    }
}

/// Color confidence based on value
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.8 {
        formatted.green().to_string()
    } else if confidence >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a loaded/missing flag
pub fn color_loaded(loaded: bool) -> String {
    if loaded {
        "loaded".green().to_string()
    } else {
        "missing".red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(119), "1m 59s");
        assert_eq!(format_duration(300), "5m 00s");
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.85), "85%");
        assert_eq!(format_confidence(1.0), "100%");
    }

    #[test]
    fn test_colors_keep_text() {
        colored::control::set_override(false);
        assert_eq!(color_label("POOR"), "POOR");
        assert_eq!(color_action("PUMP_ON"), "PUMP_ON");
        assert_eq!(color_loaded(false), "missing");
    }
}
