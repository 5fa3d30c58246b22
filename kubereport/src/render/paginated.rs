//! Fixed-page table rendering.
//!
//! All placement decisions live here and in [`super::layout`]; a [`Surface`]
//! only draws what it is told, so the page-break logic runs the same against
//! the PDF writer and against the recording surface the tests use.

use std::io::Write;

use tracing::debug;

use super::{
    fonts::Font,
    layout::{MeasuredRow, PageCursor, TableLayout, TableState},
    Preamble, Renderer, BANNER, REPORT_TITLE,
};
use crate::{config::PageConfig, error::RenderError, table::RecordTable};

/// Baseline position inside a line box, as a fraction of the line height.
const BASELINE: f64 = 0.75;

/// A drawing target with top-left origin and millimetre units.
pub trait Surface {
    fn new_page(&mut self);

    /// Draws one line of text with its baseline at `y`.
    fn text(&mut self, x: f64, y: f64, font: Font, size: f64, text: &str);

    /// Cell border; header cells are shaded.
    fn cell(&mut self, x: f64, y: f64, width: f64, height: f64, shaded: bool);

    fn write_to(&mut self, out: &mut dyn Write) -> Result<(), RenderError>;
}

pub struct PaginatedRenderer<S: Surface> {
    surface: S,
    page: PageConfig,
    cursor: PageCursor,
    pages: usize,
}

impl<S: Surface> PaginatedRenderer<S> {
    pub fn new(surface: S, page: PageConfig) -> Self {
        let cursor = PageCursor::new(&page);
        Self {
            surface,
            page,
            cursor,
            pages: 0,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    fn break_page(&mut self) {
        self.surface.new_page();
        self.cursor.reset();
        self.pages += 1;
    }

    fn ensure_page(&mut self) {
        if self.pages == 0 {
            self.break_page();
        }
    }

    fn line(&mut self, font: Font, size: f64, height: f64, text: &str) {
        let baseline = self.cursor.y() + height * BASELINE;
        self.surface.text(self.page.margin, baseline, font, size, text);
        self.cursor.advance(height);
    }

    fn layout(&self, table: &RecordTable) -> TableLayout {
        TableLayout::new(
            table.widths(),
            table.columns().len(),
            self.page.margin,
            self.page.printable_width(),
        )
    }

    fn measure_header(&self, table: &RecordTable, layout: &TableLayout) -> MeasuredRow {
        let mut header = MeasuredRow::measure(
            table.columns(),
            layout,
            Font::Bold,
            self.page.header_font_size,
            self.page.header_height,
            &self.page,
        );
        header.clip(self.cursor.body_height() / 2.0, &self.page);
        header
    }

    /// A header that fits in the top margin is drawn there on fresh pages,
    /// leaving the whole body to rows.
    fn header_in_margin(&self, header: &MeasuredRow) -> bool {
        header.height <= self.page.margin
    }

    /// Tallest a row may be and still fit on a fresh page under its header.
    fn row_limit(&self, header: &MeasuredRow) -> f64 {
        if self.header_in_margin(header) {
            self.cursor.body_height()
        } else {
            self.cursor.body_height() - header.height
        }
    }

    /// Tallest a first row may be and still share a fresh page with the
    /// section title and an inline header.
    fn first_row_limit(&self, header: &MeasuredRow) -> f64 {
        let limit = self.cursor.body_height() - self.page.title_height - header.height;
        limit.max(self.page.line_height + 2.0 * self.page.cell_padding)
    }

    fn measure_row(&self, cells: &[String], layout: &TableLayout, max_height: f64) -> MeasuredRow {
        let mut row = MeasuredRow::measure(
            cells,
            layout,
            Font::Regular,
            self.page.font_size,
            self.page.min_row_height,
            &self.page,
        );
        row.clip(max_height, &self.page);
        row
    }

    fn draw_row_at(&mut self, layout: &TableLayout, row: &MeasuredRow, header: bool, top: f64) {
        let (font, size) = if header {
            (Font::Bold, self.page.header_font_size)
        } else {
            (Font::Regular, self.page.font_size)
        };
        let padding = self.page.cell_padding;

        for (column, lines) in row.lines.iter().enumerate() {
            let x = layout.x_of(column);
            self.surface
                .cell(x, top, layout.widths()[column], row.height, header);
            for (n, text) in lines.iter().enumerate() {
                let baseline = top + padding + (n as f64 + BASELINE) * self.page.line_height;
                self.surface.text(x + padding, baseline, font, size, text);
            }
        }
    }

    fn draw_row(&mut self, layout: &TableLayout, row: &MeasuredRow, header: bool) {
        self.draw_row_at(layout, row, header, self.cursor.y());
        self.cursor.advance(row.height);
    }

    /// Draws the header and rows, repeating the header on every page the
    /// table spills onto.
    pub fn render_table(&mut self, table: &RecordTable) {
        self.render_rows(table, None);
    }

    /// `first_limit` caps the first row so it fits under a section title.
    fn render_rows(&mut self, table: &RecordTable, first_limit: Option<f64>) {
        self.ensure_page();
        let layout = self.layout(table);
        let header = self.measure_header(table, &layout);
        let row_limit = self.row_limit(&header);

        let mut next = 0;
        let mut state = TableState::AwaitingHeader;
        loop {
            state = match state {
                TableState::AwaitingHeader => {
                    if self.cursor.at_top() && self.header_in_margin(&header) {
                        let top = self.page.margin - header.height;
                        self.draw_row_at(&layout, &header, true, top);
                        TableState::RenderingRows
                    } else if !self.cursor.at_top() && !self.cursor.fits(header.height) {
                        TableState::PageBreakPending
                    } else {
                        self.draw_row(&layout, &header, true);
                        TableState::RenderingRows
                    }
                }
                TableState::RenderingRows => match table.rows().get(next) {
                    None => TableState::SectionDone,
                    Some(cells) => {
                        let limit = match first_limit {
                            Some(first) if next == 0 => first,
                            _ => row_limit,
                        };
                        let row = self.measure_row(cells, &layout, limit);
                        if self.cursor.fits(row.height) {
                            self.draw_row(&layout, &row, false);
                            next += 1;
                            TableState::RenderingRows
                        } else {
                            TableState::PageBreakPending
                        }
                    }
                },
                TableState::PageBreakPending => {
                    self.break_page();
                    TableState::AwaitingHeader
                }
                TableState::SectionDone => break,
            };
        }
    }
}

impl<S: Surface> Renderer for PaginatedRenderer<S> {
    fn begin(&mut self, preamble: &Preamble) -> Result<(), RenderError> {
        self.ensure_page();
        let page = self.page.clone();
        self.line(Font::Bold, page.banner_font_size, page.title_height, BANNER);
        self.line(Font::Bold, page.banner_font_size, page.title_height, REPORT_TITLE);
        self.line(
            Font::Regular,
            page.font_size,
            page.line_height,
            &format!("Cluster: {}", preamble.cluster),
        );
        self.line(
            Font::Regular,
            page.font_size,
            page.line_height,
            &format!("Generated: {}", preamble.generated_label()),
        );
        Ok(())
    }

    /// The title only goes on this page if the header and first row fit
    /// under it. The first row is clipped so that a fresh page always holds
    /// all three.
    #[tracing::instrument(skip(self, table), fields(rows = table.len()))]
    fn render_section(&mut self, title: &str, table: &RecordTable) -> Result<(), RenderError> {
        self.ensure_page();
        let layout = self.layout(table);
        let header = self.measure_header(table, &layout);
        let first_limit = self.first_row_limit(&header);
        let first_row = table
            .rows()
            .first()
            .map_or(0.0, |cells| self.measure_row(cells, &layout, first_limit).height);

        let mut gap = if self.cursor.at_top() { 0.0 } else { self.page.section_gap };
        let block = gap + self.page.title_height + header.height + first_row;
        if !self.cursor.at_top() && !self.cursor.fits(block) {
            self.break_page();
            gap = 0.0;
        }
        self.cursor.advance(gap);
        self.line(Font::Bold, self.page.title_font_size, self.page.title_height, title);

        self.render_rows(table, Some(first_limit));
        debug!(pages = self.pages, "section laid out");
        Ok(())
    }

    fn finish(&mut self, out: &mut dyn Write) -> Result<(), RenderError> {
        self.ensure_page();
        self.surface.write_to(out)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Op, RecordingSurface};
    use super::*;
    use pretty_assertions::assert_eq;

    /// 100mm pages with 10mm margins and 10mm rows: eight rows per page, with
    /// repeated headers in the top margin.
    fn small_page() -> PageConfig {
        PageConfig {
            height: 100.0,
            margin: 10.0,
            line_height: 5.0,
            cell_padding: 1.0,
            min_row_height: 10.0,
            header_height: 10.0,
            title_height: 10.0,
            section_gap: 5.0,
            ..PageConfig::default()
        }
    }

    fn table(rows: usize) -> RecordTable {
        let mut table = RecordTable::new(["NAME", "VALUE"]);
        for i in 0..rows {
            table
                .push_row(vec![format!("row-{i:03}"), i.to_string()])
                .unwrap();
        }
        table
    }

    fn header_cells(surface: &RecordingSurface) -> Vec<(usize, f64)> {
        surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Cell {
                    page, y, shaded: true, ..
                } => Some((*page, *y)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_page_count_formula() {
        let page = small_page();
        let per_page = ((page.height - 2.0 * page.margin) / page.min_row_height).floor() as usize;

        for n in [0, 1, 7, 8, 9, 16, 17, 50] {
            let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), page.clone());
            renderer.render_table(&table(n));
            let expected = n.div_ceil(per_page).max(1);
            assert_eq!(renderer.pages(), expected, "rows = {n}");
        }
    }

    #[test]
    fn test_header_once_per_page_at_top() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        renderer.render_table(&table(20));
        assert_eq!(renderer.pages(), 3);

        let surface = renderer.into_surface();
        // Two header cells per page, both in the top margin band.
        let headers = header_cells(&surface);
        assert_eq!(headers.len(), 6);
        for page in 1..=3 {
            let on_page: Vec<_> = headers.iter().filter(|(p, _)| *p == page).collect();
            assert_eq!(on_page.len(), 2);
            assert!(on_page.iter().all(|(_, y)| *y == 0.0));
            assert_eq!(
                surface.texts_on(page).iter().filter(|t| **t == "NAME").count(),
                1
            );
        }
        assert_eq!(surface.page_of("row-019"), Some(3));
    }

    #[test]
    fn test_title_is_never_orphaned() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        // Title, header and five rows leave 10mm: enough for a title alone.
        renderer.render_section("First", &table(5)).unwrap();
        renderer.render_section("Second", &table(1)).unwrap();

        let surface = renderer.into_surface();
        assert_eq!(surface.page_of("First"), Some(1));
        assert_eq!(surface.page_of("Second"), Some(2));
        assert_eq!(surface.page_of("row-000"), Some(1));
    }

    #[test]
    fn test_sections_share_a_page_when_they_fit() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        renderer.render_section("First", &table(1)).unwrap();
        renderer.render_section("Second", &table(1)).unwrap();
        assert_eq!(renderer.pages(), 1);
    }

    #[test]
    fn test_empty_table_still_gets_title_and_header() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        renderer.render_section("[ JOB DETAILS ]", &table(0)).unwrap();
        let surface = renderer.into_surface();
        assert_eq!(surface.texts_on(1), vec!["[ JOB DETAILS ]", "NAME", "VALUE"]);
    }

    fn tall_table(first: Option<&str>, lines: usize) -> RecordTable {
        let mut tall = RecordTable::new(["NAME", "VALUE"]);
        if let Some(first) = first {
            tall.push_row(vec![first.into(), "1".into()]).unwrap();
        }
        tall.push_row(vec!["big".into(), "x\n".repeat(lines - 1) + "x"])
            .unwrap();
        tall
    }

    fn count_x(surface: &RecordingSurface, page: usize) -> usize {
        surface.texts_on(page).iter().filter(|t| **t == "x").count()
    }

    #[test]
    fn test_first_row_stays_with_its_title() {
        // 12 lines need 62mm; under a 10mm title and 10mm header only 60mm remain.
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        renderer.render_section("Tall", &tall_table(None, 12)).unwrap();

        assert_eq!(renderer.pages(), 1);
        let surface = renderer.into_surface();
        assert_eq!(surface.page_of("Tall"), Some(1));
        assert_eq!(surface.page_of("big"), Some(1));
        assert_eq!(count_x(&surface, 1), 11);
    }

    #[test]
    fn test_first_row_moves_the_title_along() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        renderer.render_section("First", &table(1)).unwrap();
        renderer.render_section("Tall", &tall_table(None, 12)).unwrap();

        let surface = renderer.into_surface();
        assert_eq!(surface.page_of("Tall"), Some(2));
        assert_eq!(surface.page_of("big"), Some(2));
        assert_eq!(surface.texts_on(1), vec!["First", "NAME", "VALUE", "row-000", "0"]);
    }

    #[test]
    fn test_oversized_row_is_clipped_to_the_page_body() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), small_page());
        renderer.render_table(&tall_table(Some("small"), 100));

        assert_eq!(renderer.pages(), 2);
        let surface = renderer.into_surface();
        // The header sits in the margin, so the row gets the whole 80mm body.
        assert_eq!(surface.page_of("small"), Some(1));
        assert_eq!(surface.page_of("big"), Some(2));
        assert_eq!(count_x(&surface, 2), 15);
    }

    #[test]
    fn test_preamble_then_finish() {
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), PageConfig::default());
        let preamble = Preamble {
            cluster: "kind-dev".into(),
            generated_at: "2024-03-04T12:00:00+00:00[UTC]".parse().unwrap(),
        };
        renderer.begin(&preamble).unwrap();
        let mut out = Vec::new();
        renderer.finish(&mut out).unwrap();

        assert_eq!(out, b"1 pages\n");
        let surface = renderer.into_surface();
        assert_eq!(
            surface.texts_on(1),
            vec![
                "KUBEREPORT",
                "Kubernetes Cluster Qualification Report",
                "Cluster: kind-dev",
                "Generated: 04-03-2024 12:00 UTC",
            ]
        );
    }
}
