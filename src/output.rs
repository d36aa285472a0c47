//! # Terminal Output
//!
//! Decides whether commands print colors and emoji markers, and provides the
//! small set of markers the commands share.
//!
//! Auto detection honours, in order:
//! - `NO_COLOR` (any value, including empty) turns colors off
//! - `CLICOLOR=0` turns colors off
//! - `CLICOLOR_FORCE` (non-zero) turns colors on even without a TTY
//! - `TERM=dumb` turns colors off
//! - otherwise whatever `console` reports for stdout

use std::env;
use std::fmt::Display;

use clap::ValueEnum;
use console::style;

/// Value of the global `--color` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorWhen {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(when: ColorWhen) -> Self {
        let use_color = match when {
            ColorWhen::Always => true,
            ColorWhen::Never => false,
            ColorWhen::Auto => detect_color_support(),
        };
        console::set_colors_enabled(use_color);
        Self { use_color }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// `fancy` when colors are on, `plain` otherwise.
    pub fn marker<'a>(&self, fancy: &'a str, plain: &'a str) -> &'a str {
        if self.use_color {
            fancy
        } else {
            plain
        }
    }

    pub fn ok(&self) -> &'static str {
        self.marker("✅", "[OK]")
    }

    pub fn fail(&self) -> &'static str {
        self.marker("❌", "[FAIL]")
    }

    pub fn warn(&self) -> &'static str {
        self.marker("⚠️ ", "[WARN]")
    }

    pub fn info(&self) -> &'static str {
        self.marker("🔍", "[INFO]")
    }

    /// Table cell for a yes/no column.
    pub fn check(&self, yes: bool) -> &'static str {
        match (yes, self.use_color) {
            (true, true) => "✓",
            (false, true) => "✗",
            (true, false) => "yes",
            (false, false) => "no",
        }
    }

    pub fn heading<T: Display>(&self, text: T) -> String {
        if self.use_color {
            style(text).cyan().bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn dim<T: Display>(&self, text: T) -> String {
        if self.use_color {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(ColorWhen::Auto)
    }
}

fn detect_color_support() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}

/// Render rows as left-aligned columns separated by two spaces.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| console::measure_text_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let width = console::measure_text_width(cell);
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut out = render_row(&widths, headers.iter().copied());
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(&widths, row.iter().map(String::as_str)));
        out.push('\n');
    }
    out
}

fn render_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let line: Vec<String> = cells
        .enumerate()
        .map(|(i, cell)| {
            let width = widths.get(i).copied().unwrap_or(0);
            let pad = width.saturating_sub(console::measure_text_width(cell));
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    line.join("  ").trim_end().to_string()
}
