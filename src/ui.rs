// Terminal UI utilities

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        "╔════════════════════════════════════════════════════════════╗".bright_blue()
    );
    println!("{}", format!("║  {:<58}║", title).bright_blue());
    println!(
        "{}",
        "╚════════════════════════════════════════════════════════════╝".bright_blue()
    );
    println!();
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).bright_cyan());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).bright_yellow());
}

pub fn print_dim(message: &str) {
    println!("{}", message.dimmed());
}

/// Spinner with a steady tick; hidden automatically when stderr is not a terminal
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Human-readable duration rounded to whole seconds (`1m 5s`)
pub fn format_duration(duration: Duration) -> String {
    let secs = Duration::from_secs(duration.as_secs());
    if secs.is_zero() {
        return format!("{}ms", duration.as_millis());
    }
    humantime::format_duration(secs).to_string()
}

/// Render rows as a left-aligned text table with a bold header
///
/// Cells are padded by character count, so colored cells must be colored
/// after layout (see `colorize`).
pub fn render_table(
    headers: &[&str],
    rows: &[Vec<String>],
    colorize: impl Fn(usize, &str) -> String,
) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let pad = |text: &str, width: usize| {
        let fill = width.saturating_sub(text.chars().count());
        format!("{}{}", text, " ".repeat(fill))
    };

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w).bold().to_string())
        .collect();
    out.push_str(header_line.join("  ").trim_end());
    out.push('\n');

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                let padded = pad(cell, *w);
                let colored = colorize(i, cell);
                padded.replacen(cell.as_str(), &colored, 1)
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_alignment() {
        colored::control::set_override(false);
        let rows = vec![
            vec!["api".to_string(), "running".to_string()],
            vec!["postgres".to_string(), "exited".to_string()],
        ];
        let table = render_table(&["SERVICE", "STATE"], &rows, |_, cell| cell.to_string());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "SERVICE   STATE");
        assert_eq!(lines[1], "api       running");
        assert_eq!(lines[2], "postgres  exited");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(65_400)), "1m 5s");
    }
}
