//! Output formatting for strata commands.
//!
//! Every command result is `Serialize` and knows how to draw itself as a
//! table; `--json` switches to machine-readable output on stdout.

use serde::Serialize;
use std::io::IsTerminal;

mod table;

pub use self::table::TableOutput;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Table
        }
    }
}

/// Types that render as a human-readable table.
pub trait TableDisplay: Serialize {
    fn to_table(&self) -> String;
}

/// A command result paired with its output format.
pub struct Output<T> {
    data: T,
    format: OutputFormat,
}

impl<T: TableDisplay> Output<T> {
    pub fn new(data: T, format: OutputFormat) -> Self {
        Self { data, format }
    }

    pub fn render_to_string(&self) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.data.to_table()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&self.data)?),
        }
    }

    /// Print to stdout.
    pub fn render(&self) -> anyhow::Result<()> {
        println!("{}", self.render_to_string()?);
        Ok(())
    }
}

/// Disable colors when stdout is not a terminal.
pub fn configure_colors() {
    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Human-readable byte size.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Dummy {
        name: &'static str,
    }

    impl TableDisplay for Dummy {
        fn to_table(&self) -> String {
            format!("name: {}", self.name)
        }
    }

    #[test]
    fn test_render_table_and_json() {
        let table = Output::new(Dummy { name: "x" }, OutputFormat::Table);
        assert_eq!(table.render_to_string().unwrap(), "name: x");

        let json = Output::new(Dummy { name: "x" }, OutputFormat::from_json_flag(true));
        let value: serde_json::Value =
            serde_json::from_str(&json.render_to_string().unwrap()).unwrap();
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
