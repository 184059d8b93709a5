//! Table observer for pretty-printing the registry.
//!
//! This module provides [`TableObserver`], which renders the currently
//! allocated counters of a [`CountersReader`] as a formatted ASCII table
//! using the `tabled` crate.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! registro = { version = "0.2", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use registro::observers::table::{TableObserver, TableStyle};
//! use registro::registry::CountersReader;
//!
//! let reader = CountersReader::new(metadata.as_buffer(), values.as_buffer());
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render(&reader)?);
//! // ╭────┬──────┬───────────────────┬───────╮
//! // │ Id │ Type │ Label             │ Value │
//! // ├────┼──────┼───────────────────┼───────┤
//! // │ 0  │ 0    │ messages received │ 128   │
//! // │ 2  │ 3    │ publisher limit   │ 4096  │
//! // ╰────┴──────┴───────────────────┴───────╯
//! ```

use crate::observers::Result;
use crate::registry::CountersReader;
use tabled::{builder::Builder, settings::Style, Table};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// Extended ASCII characters
    Extended,
    /// GitHub-flavored Markdown table
    Markdown,
    /// ReStructuredText table
    ReStructuredText,
    /// Dots for borders
    Dots,
    /// No borders, just spacing
    Blank,
}

/// Configuration for the table observer.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// The style to use for rendering.
    pub style: TableStyle,
    /// Whether to show the header row.
    pub show_header: bool,
    /// Whether to include the type id column.
    pub show_type_ids: bool,
    /// Custom title for the table (optional).
    pub title: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            show_type_ids: true,
            title: None,
        }
    }
}

/// An observer that renders the registry as a formatted ASCII table.
///
/// One row per allocated counter, in ascending id order: reclaimed slots
/// do not appear, exactly as in the registry's own enumeration. The
/// value column is read with the same ordered load a monitoring process
/// would use, so a table rendered while the writer is live shows each
/// counter's latest published value.
///
/// # Examples
///
/// ```rust,ignore
/// use registro::observers::table::{TableObserver, TableStyle};
///
/// let output = TableObserver::new()
///     .with_style(TableStyle::Markdown)
///     .with_title("stream counters")
///     .render(&reader)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    config: TableConfig,
}

impl TableObserver {
    /// Creates a new table observer with default settings.
    ///
    /// Default style is [`TableStyle::Rounded`] with header and type id
    /// column shown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new table observer with the specified configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self { config }
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Sets whether to show the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    /// Sets whether to include the type id column.
    pub fn with_type_ids(mut self, show: bool) -> Self {
        self.config.show_type_ids = show;
        self
    }

    /// Sets an optional title for the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    /// Applies the configured style to a table.
    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Extended => {
                table.with(Style::extended());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::ReStructuredText => {
                table.with(Style::re_structured_text());
            }
            TableStyle::Dots => {
                table.with(Style::dots());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    /// Renders the currently allocated counters as a table string.
    ///
    /// # Errors
    ///
    /// Propagates a label decode failure from the registry enumeration.
    pub fn render(&self, reader: &CountersReader<'_>) -> Result<String> {
        let mut builder = Builder::default();

        if self.config.show_header {
            builder.push_record(self.record(
                "Id".to_owned(),
                "Type".to_owned(),
                "Label".to_owned(),
                "Value".to_owned(),
            ));
        }

        reader.for_each_metadata(|id, type_id, _key, label| {
            builder.push_record(self.record(
                id.to_string(),
                type_id.to_string(),
                label.to_owned(),
                reader.counter_value(id).to_string(),
            ));
        })?;

        let mut table = builder.build();
        self.apply_style(&mut table);

        if let Some(ref title) = self.config.title {
            Ok(format!("{}\n{}", title, table))
        } else {
            Ok(table.to_string())
        }
    }

    /// Assembles one row, honoring the type id column setting.
    fn record(&self, id: String, type_id: String, label: String, value: String) -> Vec<String> {
        if self.config.show_type_ids {
            vec![id, type_id, label, value]
        } else {
            vec![id, label, value]
        }
    }
}
