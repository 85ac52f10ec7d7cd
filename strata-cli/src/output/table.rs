//! Table output formatting using the `tabled` crate.

use tabled::{
    builder::Builder,
    settings::{object::Columns, style::Style, Alignment, Modify},
};

pub struct TableOutput;

impl TableOutput {
    /// Two-column table with right-aligned keys.
    pub fn key_value(pairs: &[(&str, String)]) -> String {
        let mut builder = Builder::default();
        for (key, value) in pairs {
            builder.push_record([*key, value.as_str()]);
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        table.with(Modify::new(Columns::first()).with(Alignment::right()));
        table.to_string()
    }

    /// Table with a header row.
    pub fn from_rows(headers: &[&str], rows: &[Vec<String>]) -> String {
        if rows.is_empty() {
            return "(none)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(headers.iter().copied());
        for row in rows {
            builder.push_record(row.iter().map(|s| s.as_str()));
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        table.to_string()
    }
}
