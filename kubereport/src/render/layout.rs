//! Geometry for the paginated renderer, kept free of any drawing so page
//! breaks can be tested on their own.

use tracing::warn;

use super::fonts::Font;
use crate::{config::PageConfig, table::ColumnWidths};

/// Slack for float comparisons against the page bottom.
const EPSILON: f64 = 1e-6;

/// Greedy word wrap. Hard line breaks are kept, words wider than the column
/// are split between characters, and empty text still occupies one line.
pub fn wrap(text: &str, width: f64, font: Font, size: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for hard in text.split('\n') {
        let hard = hard.trim_end_matches('\r');
        let mut current = String::new();
        for word in hard.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if font.text_width(&candidate, size) <= width + EPSILON {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = split_long_word(word, width, font, size, &mut lines);
        }
        lines.push(current);
    }
    lines
}

/// Pushes full-width chunks of `word` and returns the unfinished tail.
fn split_long_word(word: &str, width: f64, font: Font, size: f64, lines: &mut Vec<String>) -> String {
    let mut chunk = String::new();
    for c in word.chars() {
        chunk.push(c);
        if font.text_width(&chunk, size) > width + EPSILON && chunk.chars().count() > 1 {
            chunk.pop();
            lines.push(std::mem::replace(&mut chunk, c.to_string()));
        }
    }
    chunk
}

/// Column positions for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    left: f64,
    widths: Vec<f64>,
}

impl TableLayout {
    /// Fixed widths wider than the printable area are scaled down to fit it.
    pub fn new(sizing: &ColumnWidths, columns: usize, left: f64, printable: f64) -> Self {
        let equal = || vec![printable / columns.max(1) as f64; columns];
        let widths = match sizing {
            ColumnWidths::Equal => equal(),
            ColumnWidths::Fixed(fixed) if fixed.len() == columns => {
                let total: f64 = fixed.iter().sum();
                if total > printable {
                    fixed.iter().map(|w| w * printable / total).collect()
                } else {
                    fixed.clone()
                }
            }
            ColumnWidths::Fixed(fixed) => {
                warn!(
                    widths = fixed.len(),
                    columns, "fixed widths do not match the columns, dividing equally"
                );
                equal()
            }
        };
        Self { left, widths }
    }

    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    pub fn x_of(&self, column: usize) -> f64 {
        self.left + self.widths[..column].iter().sum::<f64>()
    }
}

/// A row's wrapped cell text and the height it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredRow {
    pub lines: Vec<Vec<String>>,
    pub height: f64,
}

impl MeasuredRow {
    pub fn measure(
        cells: &[String],
        layout: &TableLayout,
        font: Font,
        size: f64,
        min_height: f64,
        page: &PageConfig,
    ) -> Self {
        let inner = |w: f64| (w - 2.0 * page.cell_padding).max(0.0);
        let lines: Vec<Vec<String>> = cells
            .iter()
            .zip(layout.widths())
            .map(|(cell, w)| wrap(cell, inner(*w), font, size))
            .collect();
        let tallest = lines.iter().map(Vec::len).max().unwrap_or(1);
        let height = (tallest as f64 * page.line_height + 2.0 * page.cell_padding).max(min_height);
        Self { lines, height }
    }

    /// Drops trailing lines so the row is at most `max_height` tall.
    pub fn clip(&mut self, max_height: f64, page: &PageConfig) {
        if self.height <= max_height + EPSILON {
            return;
        }
        let fit = ((max_height - 2.0 * page.cell_padding) / page.line_height).floor();
        let keep = (fit.max(1.0)) as usize;
        for cell in &mut self.lines {
            cell.truncate(keep);
        }
        self.height = max_height;
    }
}

/// Vertical position on the current page, in millimetres from the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    y: f64,
    top: f64,
    bottom: f64,
}

impl PageCursor {
    pub fn new(page: &PageConfig) -> Self {
        Self {
            y: page.margin,
            top: page.margin,
            bottom: page.body_bottom(),
        }
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn fits(&self, height: f64) -> bool {
        self.y + height <= self.bottom + EPSILON
    }

    pub fn advance(&mut self, height: f64) {
        self.y += height;
    }

    pub fn reset(&mut self) {
        self.y = self.top;
    }

    pub fn at_top(&self) -> bool {
        (self.y - self.top).abs() < EPSILON
    }

    /// Height of a whole page body.
    pub fn body_height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Where a table is in its life on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    AwaitingHeader,
    RenderingRows,
    PageBreakPending,
    SectionDone,
}
