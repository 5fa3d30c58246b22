//! Output sinks. Both consume the same [`RecordTable`]s; neither knows
//! where the rows came from.

use std::io::Write;

use jiff::Zoned;

use crate::{error::RenderError, table::RecordTable};

pub mod delimited;
pub mod fonts;
pub mod layout;
pub mod paginated;
pub mod pdf;

pub use delimited::DelimitedRenderer;
pub use paginated::{PaginatedRenderer, Surface};
pub use pdf::PdfDocument;

/// Fixed first line of every artifact.
pub const BANNER: &str = "KUBEREPORT";
pub const REPORT_TITLE: &str = "Kubernetes Cluster Qualification Report";

/// What a report says about itself before the first section.
#[derive(Debug, Clone)]
pub struct Preamble {
    pub cluster: String,
    pub generated_at: Zoned,
}

impl Preamble {
    pub fn generated_label(&self) -> String {
        self.generated_at.strftime("%d-%m-%Y %H:%M %Z").to_string()
    }
}

pub trait Renderer {
    fn begin(&mut self, preamble: &Preamble) -> Result<(), RenderError>;

    fn render_section(&mut self, title: &str, table: &RecordTable) -> Result<(), RenderError>;

    /// Writes the finished document. Nothing reaches `out` before this.
    fn finish(&mut self, out: &mut dyn Write) -> Result<(), RenderError>;
}
