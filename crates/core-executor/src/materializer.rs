use std::fmt::Write;
use std::ops::ControlFlow;

use crate::models::{ResultChunk, ResultHandling, Row, Variables};
use crate::utils::MAX_STORE_CHARS;

/// Text and counters produced from one invocation's results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub text: String,
    pub total_rows: u64,
    pub variables: Variables,
}

/// Renders result sets into bounded text.
///
/// Formatting stops once the text reaches the character budget or the row
/// cap, but every row is still counted so the total stays exact.
#[derive(Debug)]
pub struct Materializer {
    mode: ResultHandling,
    max_chars: usize,
    max_rows: Option<u64>,
    variable_names: Vec<String>,
    text: String,
    chars: usize,
    result_sets: usize,
    total_rows: u64,
    formatted_rows: u64,
    header_written: bool,
    exported: Option<Variables>,
}

impl Materializer {
    #[must_use]
    pub fn new(mode: ResultHandling, max_rows: Option<u64>) -> Self {
        Self {
            mode,
            max_chars: MAX_STORE_CHARS,
            max_rows,
            variable_names: Vec::new(),
            text: String::new(),
            chars: 0,
            result_sets: 0,
            total_rows: 0,
            formatted_rows: 0,
            header_written: false,
            exported: None,
        }
    }

    #[must_use]
    pub const fn with_char_budget(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Names used to export the first row, comma separated. Blank names
    /// skip their column.
    #[must_use]
    pub fn with_variable_names(mut self, names: &str) -> Self {
        self.variable_names = if names.trim().is_empty() {
            Vec::new()
        } else {
            names.split(',').map(|name| name.trim().to_string()).collect()
        };
        self
    }

    #[must_use]
    pub const fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Appends one labelled result set of a data query.
    pub fn push_result_set(&mut self, chunk: &ResultChunk) {
        self.result_sets += 1;
        if !self.budget_spent() {
            let truncated = if chunk.truncated { " (TRUNCATED)" } else { "" };
            let label = format!(
                "** Result set #{}, {} rows{truncated}\n",
                self.result_sets,
                chunk.row_count()
            );
            self.append(&label);
            if self.mode == ResultHandling::StoreAsString {
                self.write_header(chunk);
                self.write_rows(chunk);
            }
        }
        self.total_rows += chunk.row_count();
        self.export(chunk);
    }

    /// Appends one chunk of a streamed result. Breaks once the row cap is hit.
    pub fn push_chunk(&mut self, chunk: &ResultChunk) -> ControlFlow<()> {
        if self.mode == ResultHandling::StoreAsString {
            if !self.header_written {
                self.write_header(chunk);
                self.header_written = true;
            }
            self.write_rows(chunk);
        }
        self.total_rows += chunk.row_count();
        self.export(chunk);
        if self.row_cap_reached() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    #[must_use]
    pub fn finish(mut self) -> Materialized {
        let summary = format!("** Total rows: {}", self.total_rows);
        self.append(&summary);
        Materialized {
            text: self.text,
            total_rows: self.total_rows,
            variables: self.exported.unwrap_or_default(),
        }
    }

    /// Labels, headers and rows stop once the budget is used up; only the
    /// total line is written after that.
    const fn budget_spent(&self) -> bool {
        self.chars >= self.max_chars
    }

    fn row_cap_reached(&self) -> bool {
        self.mode == ResultHandling::StoreAsString
            && self.max_rows.is_some_and(|max| self.formatted_rows >= max)
    }

    fn write_header(&mut self, chunk: &ResultChunk) {
        let header = chunk
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join("\t");
        self.append(&header);
        self.append("\n");
    }

    fn write_rows(&mut self, chunk: &ResultChunk) {
        for row in &chunk.rows {
            if self.budget_spent() || self.row_cap_reached() {
                break;
            }
            let line = format_row(row);
            self.append(&line);
            self.formatted_rows += 1;
        }
    }

    fn export(&mut self, chunk: &ResultChunk) {
        if self.exported.is_some() || self.variable_names.is_empty() {
            return;
        }
        let Some(first) = chunk.rows.first() else {
            return;
        };
        let variables = self
            .variable_names
            .iter()
            .zip(first.values())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.clone(), value.to_text()))
            .collect();
        self.exported = Some(variables);
    }

    fn append(&mut self, text: &str) {
        self.chars += text.chars().count();
        self.text.push_str(text);
    }
}

fn format_row(row: &Row) -> String {
    let mut line = String::new();
    for (index, value) in row.values().iter().enumerate() {
        if index > 0 {
            line.push('\t');
        }
        let _ = write!(line, "{value}");
    }
    line.push('\n');
    line
}
