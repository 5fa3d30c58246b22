use std::io::Write;

use csv::{Writer, WriterBuilder};
use tracing::debug;

use super::{Preamble, Renderer, BANNER};
use crate::{error::RenderError, table::RecordTable};

/// Flat CSV stream: a banner record, then per section a title record, the
/// header, the rows and a blank separator line.
pub struct DelimitedRenderer {
    writer: Writer<Vec<u8>>,
}

impl Default for DelimitedRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DelimitedRenderer {
    pub fn new() -> Self {
        Self {
            writer: Self::writer_over(Vec::new()),
        }
    }

    fn writer_over(buf: Vec<u8>) -> Writer<Vec<u8>> {
        WriterBuilder::new().flexible(true).from_writer(buf)
    }
}

impl Renderer for DelimitedRenderer {
    fn begin(&mut self, _preamble: &Preamble) -> Result<(), RenderError> {
        self.writer.write_record([BANNER])?;
        Ok(())
    }

    #[tracing::instrument(skip(self, table), fields(rows = table.len()))]
    fn render_section(&mut self, title: &str, table: &RecordTable) -> Result<(), RenderError> {
        self.writer.write_record([title])?;
        self.writer.write_record(table.columns())?;
        for row in table.rows() {
            self.writer.write_record(row)?;
        }
        // csv writes an empty record as `""`; the separator is a bare newline.
        self.writer.flush()?;
        let writer = std::mem::replace(&mut self.writer, Self::writer_over(Vec::new()));
        let mut buf = writer.into_inner().map_err(|e| e.into_error())?;
        buf.write_all(b"\n")?;
        self.writer = Self::writer_over(buf);
        debug!("section written");
        Ok(())
    }

    fn finish(&mut self, out: &mut dyn Write) -> Result<(), RenderError> {
        self.writer.flush()?;
        out.write_all(self.writer.get_ref())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::ReaderBuilder;
    use pretty_assertions::assert_eq;

    fn preamble() -> Preamble {
        Preamble {
            cluster: "kind-dev".into(),
            generated_at: "2024-03-04T12:00:00+00:00[UTC]".parse().unwrap(),
        }
    }

    fn render(tables: &[(&str, RecordTable)]) -> String {
        let mut renderer = DelimitedRenderer::new();
        renderer.begin(&preamble()).unwrap();
        for (title, table) in tables {
            renderer.render_section(title, table).unwrap();
        }
        let mut out = Vec::new();
        renderer.finish(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_section_layout() {
        let mut table = RecordTable::new(["Name", "Value"]);
        table.push_row(vec!["prod".into(), "3 pods".into()]).unwrap();
        let empty = RecordTable::new(["JOB NAME", "NAMESPACE"]);

        let text = render(&[("Pods", table), ("[ JOB DETAILS ]", empty)]);
        assert_eq!(
            text,
            "KUBEREPORT\nPods\nName,Value\nprod,3 pods\n\n[ JOB DETAILS ]\nJOB NAME,NAMESPACE\n\n"
        );
    }

    #[test]
    fn test_separator_is_a_bare_newline() {
        let mut table = RecordTable::new(["Name"]);
        table.push_row(vec![String::new()]).unwrap();

        let text = render(&[("Blank", table)]);
        assert_eq!(text, "KUBEREPORT\nBlank\nName\n\"\"\n\n");
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_awkward_cells_round_trip() {
        let cells = vec![
            "a,b".to_string(),
            "say \"hi\"".to_string(),
            "line1\nline2".to_string(),
        ];
        let mut table = RecordTable::new(["x", "y", "z"]);
        table.push_row(cells.clone()).unwrap();

        let text = render(&[("Odd", table)]);
        assert!(text.contains("\"say \"\"hi\"\"\""));

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let records: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(records[0], vec!["KUBEREPORT"]);
        assert_eq!(records[1], vec!["Odd"]);
        assert_eq!(records[3], cells);
    }
}
