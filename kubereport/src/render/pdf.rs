use std::io::Write;

use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

use super::{
    fonts::{self, Font, PT_TO_MM},
    paginated::Surface,
};
use crate::{config::PageConfig, error::RenderError};

const HEADER_GRAY: f32 = 0.85;
const BORDER_WIDTH: f32 = 0.3;

fn pt(mm: f64) -> f32 {
    (mm / PT_TO_MM) as f32
}

/// [`Surface`] backed by `pdf-writer`. Pages are kept as content streams
/// until [`Surface::write_to`] assembles the file.
pub struct PdfDocument {
    width: f32,
    height: f32,
    pages: Vec<Content>,
}

impl PdfDocument {
    pub fn new(page: &PageConfig) -> Self {
        Self {
            width: pt(page.width),
            height: pt(page.height),
            pages: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Content {
        if self.pages.is_empty() {
            self.pages.push(Content::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Top-left millimetres to bottom-left points.
    fn flip(&self, y: f64) -> f32 {
        self.height - pt(y)
    }

    fn assemble(&mut self) -> Vec<u8> {
        let mut pdf = Pdf::new();
        let catalog_id = Ref::new(1);
        let tree_id = Ref::new(2);
        let regular_id = Ref::new(3);
        let bold_id = Ref::new(4);
        let mut next = 5;
        let mut alloc = || {
            let id = Ref::new(next);
            next += 1;
            id
        };

        let pages = std::mem::take(&mut self.pages);
        let ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (alloc(), alloc())).collect();

        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id)
            .kids(ids.iter().map(|(page_id, _)| *page_id))
            .count(ids.len() as i32);

        for (font, id) in [(Font::Regular, regular_id), (Font::Bold, bold_id)] {
            pdf.type1_font(id)
                .base_font(Name(font.base_name().as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }

        for ((page_id, content_id), content) in ids.into_iter().zip(pages) {
            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, self.width, self.height));
            page.parent(tree_id);
            page.contents(content_id);
            page.resources()
                .fonts()
                .pair(Name(Font::Regular.resource_name().as_bytes()), regular_id)
                .pair(Name(Font::Bold.resource_name().as_bytes()), bold_id);
            page.finish();
            pdf.stream(content_id, &content.finish());
        }

        pdf.finish()
    }
}

impl Surface for PdfDocument {
    fn new_page(&mut self) {
        self.pages.push(Content::new());
    }

    fn text(&mut self, x: f64, y: f64, font: Font, size: f64, text: &str) {
        let encoded = fonts::encode(text);
        let (x, y) = (pt(x), self.flip(y));
        let content = self.current();
        content.begin_text();
        content.set_font(Name(font.resource_name().as_bytes()), size as f32);
        content.next_line(x, y);
        content.show(Str(&encoded));
        content.end_text();
    }

    fn cell(&mut self, x: f64, y: f64, width: f64, height: f64, shaded: bool) {
        let rect = (pt(x), self.flip(y + height), pt(width), pt(height));
        let content = self.current();
        content.save_state();
        content.set_line_width(BORDER_WIDTH);
        content.rect(rect.0, rect.1, rect.2, rect.3);
        if shaded {
            content.set_fill_gray(HEADER_GRAY);
            content.fill_nonzero_and_stroke();
        } else {
            content.stroke();
        }
        content.restore_state();
    }

    fn write_to(&mut self, out: &mut dyn Write) -> Result<(), RenderError> {
        out.write_all(&self.assemble())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PaginatedRenderer, Preamble, Renderer};
    use crate::table::RecordTable;

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_writes_a_pdf_per_page() {
        let mut doc = PdfDocument::new(&PageConfig::default());
        doc.new_page();
        doc.text(10.0, 20.0, Font::Bold, 18.0, "KUBEREPORT");
        doc.new_page();
        doc.cell(10.0, 10.0, 50.0, 7.0, true);

        let mut out = Vec::new();
        doc.write_to(&mut out).unwrap();
        assert!(out.starts_with(b"%PDF-"));
        let pages = count(&out, b"/Type /Page") - count(&out, b"/Type /Pages");
        assert_eq!(pages, 2);
        assert_eq!(count(&out, b"/BaseFont /Helvetica-Bold"), 1);
        assert_eq!(count(&out, b"/WinAnsiEncoding"), 2);
    }

    #[test]
    fn test_renderer_over_pdf() {
        let mut renderer = PaginatedRenderer::new(
            PdfDocument::new(&PageConfig::default()),
            PageConfig::default(),
        );
        let preamble = Preamble {
            cluster: "kind-dev".into(),
            generated_at: "2024-03-04T12:00:00+00:00[UTC]".parse().unwrap(),
        };
        let mut table = RecordTable::new(["Name", "Value"]);
        table.push_row(vec!["prod".into(), "3 pods".into()]).unwrap();

        renderer.begin(&preamble).unwrap();
        renderer.render_section("Pod Distribution By Namespace", &table).unwrap();
        let mut out = Vec::new();
        Renderer::finish(&mut renderer, &mut out).unwrap();

        assert!(out.starts_with(b"%PDF-"));
        assert!(out.ends_with(b"%%EOF") || out.ends_with(b"%%EOF\n"));
        assert_eq!(renderer.pages(), 1);
    }
}
