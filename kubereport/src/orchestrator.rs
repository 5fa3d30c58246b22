//! Drives one report run: sections in catalog order into one renderer, then
//! one artifact on disk.
//!
//! Any section failure aborts the whole run. The artifact is written to a
//! temporary file next to its final path and only renamed into place once
//! everything succeeded, so a failed run leaves the output directory as it
//! found it.

use std::path::{Path, PathBuf};

use jiff::Zoned;
use tracing::{error, info, info_span, Dispatch};

use crate::{
    config::{OutputFormat, PageConfig, ReportConfig},
    error::{RenderError, ReportError},
    render::{DelimitedRenderer, PaginatedRenderer, PdfDocument, Preamble, Renderer},
    sections::{self, Section},
    source::{kube::KubeSource, DataSource, InMemorySource},
};

const ARTIFACT_PREFIX: &str = "kubernetes_cluster_report_";

/// What a successful run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub path: PathBuf,
    pub cluster: String,
}

/// `kubernetes_cluster_report_DD-MM-YYYY-HH-MM.<ext>`, in the caller's zone.
pub fn artifact_name(now: &Zoned, format: OutputFormat) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}.{}",
        now.strftime("%d-%m-%Y-%H-%M"),
        format.extension()
    )
}

pub fn renderer_for(format: OutputFormat, page: &PageConfig) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Csv => Box::new(DelimitedRenderer::new()),
        OutputFormat::Pdf => Box::new(PaginatedRenderer::new(
            PdfDocument::new(page),
            page.clone(),
        )),
    }
}

/// Opens the data source: a snapshot file when given, the cluster otherwise.
pub fn open_source(
    config: &ReportConfig,
    snapshot: Option<&Path>,
) -> Result<Box<dyn DataSource>, ReportError> {
    match snapshot {
        Some(path) => InMemorySource::from_path(path)
            .map(|s| Box::new(s) as Box<dyn DataSource>)
            .map_err(ReportError::DataSourceUnavailable),
        None => KubeSource::connect(&config.connect_options())
            .map(|s| Box::new(s) as Box<dyn DataSource>)
            .map_err(ReportError::DataSourceUnavailable),
    }
}

pub struct Orchestrator<'a> {
    source: &'a dyn DataSource,
    dispatch: Dispatch,
}

impl<'a> Orchestrator<'a> {
    pub fn new(source: &'a dyn DataSource, dispatch: Dispatch) -> Self {
        Self { source, dispatch }
    }

    /// Runs the profile's catalog with the configured sink.
    pub fn generate(&self, config: &ReportConfig, now: &Zoned) -> Result<Report, ReportError> {
        let format = config.format();
        let mut renderer = renderer_for(format, &config.page);
        self.run(
            sections::catalog(config.report),
            renderer.as_mut(),
            &config.output_dir,
            format,
            now,
        )
    }

    /// Everything inside runs under the injected dispatch.
    pub fn run(
        &self,
        sections: &[Section],
        renderer: &mut dyn Renderer,
        output_dir: &Path,
        format: OutputFormat,
        now: &Zoned,
    ) -> Result<Report, ReportError> {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let span = info_span!("report", cluster = %self.source.cluster_name());
            let _enter = span.enter();
            self.run_sections(sections, renderer, output_dir, format, now)
        })
    }

    fn run_sections(
        &self,
        sections: &[Section],
        renderer: &mut dyn Renderer,
        output_dir: &Path,
        format: OutputFormat,
        now: &Zoned,
    ) -> Result<Report, ReportError> {
        info!(sections = sections.len(), ?format, "starting report");
        let cluster = self.source.cluster_name().to_string();
        let preamble = Preamble {
            cluster: cluster.clone(),
            generated_at: now.clone(),
        };
        renderer.begin(&preamble).map_err(render_io(None))?;

        for section in sections {
            let table = section
                .kind
                .collect(self.source, now.timestamp())
                .map_err(|source| {
                    error!(section = section.title, kind = section.kind.kind(), error = %source, "section failed");
                    ReportError::Section {
                        title: section.title.to_string(),
                        kind: section.kind.kind(),
                        source,
                    }
                })?;
            renderer
                .render_section(section.title, &table)
                .map_err(render_io(Some(section.title)))?;
            info!(section = section.title, rows = table.len(), "section rendered");
        }

        let path = output_dir.join(artifact_name(now, format));
        let mut staged = tempfile::Builder::new()
            .prefix(".kubereport-")
            .suffix(".partial")
            .tempfile_in(output_dir)
            .map_err(|e| render_io(None)(e.into()))?;
        renderer
            .finish(staged.as_file_mut())
            .map_err(render_io(None))?;
        staged
            .persist(&path)
            .map_err(|e| render_io(None)(e.error.into()))?;

        info!(path = %path.display(), "report written");
        Ok(Report { path, cluster })
    }
}

fn render_io(section: Option<&str>) -> impl FnOnce(RenderError) -> ReportError + '_ {
    move |source| ReportError::RenderIo {
        section: section.map(str::to_string),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{testing, CollectorKind};
    use crate::render::paginated::testing::RecordingSurface;
    use std::fs;

    const SECTIONS: &[Section] = &[
        Section {
            title: "Pods",
            kind: CollectorKind::PodStatus,
        },
        Section {
            title: "Jobs",
            kind: CollectorKind::Jobs,
        },
    ];

    fn now() -> Zoned {
        "2024-03-04T12:07:00+00:00[UTC]".parse().unwrap()
    }

    fn source() -> InMemorySource {
        InMemorySource::new("kind-dev").with_objects(
            "Pod",
            vec![testing::pod("web-1", "prod", Some("n1"), Some("100m"))],
        )
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name(&now(), OutputFormat::Csv),
            "kubernetes_cluster_report_04-03-2024-12-07.csv"
        );
    }

    #[test]
    fn test_run_writes_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = source();
        let orchestrator = Orchestrator::new(&source, Dispatch::none());
        let mut renderer = DelimitedRenderer::new();

        let report = orchestrator
            .run(SECTIONS, &mut renderer, dir.path(), OutputFormat::Csv, &now())
            .unwrap();

        assert_eq!(report.cluster, "kind-dev");
        assert_eq!(entries(dir.path()), vec!["kubernetes_cluster_report_04-03-2024-12-07.csv"]);
        let text = fs::read_to_string(&report.path).unwrap();
        assert!(text.starts_with("KUBEREPORT\nPods\nPod Name,Namespace,Status\nweb-1,prod,Running\n\nJobs\n"));
    }

    #[test]
    fn test_failing_section_aborts_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = source().with_failure("Job", "forbidden");
        let orchestrator = Orchestrator::new(&source, Dispatch::none());
        let mut renderer = DelimitedRenderer::new();

        let err = orchestrator
            .run(SECTIONS, &mut renderer, dir.path(), OutputFormat::Csv, &now())
            .unwrap_err();

        match err {
            ReportError::Section { title, kind, .. } => {
                assert_eq!(title, "Jobs");
                assert_eq!(kind, "job");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_output_dir_is_render_io() {
        let dir = tempfile::tempdir().unwrap();
        let source = source();
        let orchestrator = Orchestrator::new(&source, Dispatch::none());
        let mut renderer = PaginatedRenderer::new(RecordingSurface::default(), PageConfig::default());

        let err = orchestrator
            .run(
                SECTIONS,
                &mut renderer,
                &dir.path().join("missing"),
                OutputFormat::Pdf,
                &now(),
            )
            .unwrap_err();
        assert!(matches!(err, ReportError::RenderIo { section: None, .. }));
    }

    #[test]
    fn test_events_go_to_injected_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        let (dispatch, guard) = crate::log::setup_logger(Some(logs.path())).unwrap();
        let source = source();
        let orchestrator = Orchestrator::new(&source, dispatch);

        let mut renderer = DelimitedRenderer::new();
        orchestrator
            .run(SECTIONS, &mut renderer, dir.path(), OutputFormat::Csv, &now())
            .unwrap();
        drop(guard);

        let log = fs::read_to_string(logs.path().join(crate::log::LOG_FILE)).unwrap();
        assert!(log.contains("section rendered"));
        assert!(log.contains("report written"));
    }
}
