//! Run configuration, read from an optional YAML file and overridden by CLI
//! flags in `main`.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{error::ReportError, source::kube::ConnectOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportProfile {
    /// Cluster overview, rendered as a paginated document by default.
    #[default]
    General,
    /// One table per resource kind, rendered as delimited text by default.
    Detailed,
}

impl ReportProfile {
    pub fn default_format(self) -> OutputFormat {
        match self {
            ReportProfile::General => OutputFormat::Pdf,
            ReportProfile::Detailed => OutputFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Page geometry for the paginated document. Lengths are millimetres and
/// font sizes are points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub line_height: f64,
    pub cell_padding: f64,
    pub font_size: f64,
    pub header_font_size: f64,
    pub title_font_size: f64,
    pub banner_font_size: f64,
    pub min_row_height: f64,
    pub header_height: f64,
    pub title_height: f64,
    pub section_gap: f64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin: 10.0,
            line_height: 5.0,
            cell_padding: 1.0,
            font_size: 8.0,
            header_font_size: 8.0,
            title_font_size: 15.0,
            banner_font_size: 18.0,
            min_row_height: 7.0,
            header_height: 7.0,
            title_height: 10.0,
            section_gap: 5.0,
        }
    }
}

impl PageConfig {
    pub fn printable_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    /// Bottom edge rows may not cross.
    pub fn body_bottom(&self) -> f64 {
        self.height - self.margin
    }

    fn validate(&self) -> Result<(), ReportError> {
        if self.printable_width() <= 0.0 || self.height - 2.0 * self.margin <= 0.0 {
            return Err(ReportError::Config(format!(
                "margins of {}mm leave no printable area on a {}x{}mm page",
                self.margin, self.width, self.height
            )));
        }
        if self.line_height <= 0.0 || self.header_height <= 0.0 {
            return Err(ReportError::Config(
                "line and header heights must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub report: ReportProfile,
    /// Defaults to the profile's format when unset.
    pub format: Option<OutputFormat>,
    pub output_dir: PathBuf,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub page: PageConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report: ReportProfile::default(),
            format: None,
            output_dir: PathBuf::from("."),
            kubeconfig: None,
            context: None,
            timeout_secs: 30,
            log_dir: None,
            page: PageConfig::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ReportError> {
        let config: ReportConfig =
            serde_yaml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;
        config.page.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ReportError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&text)
    }

    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| self.report.default_format())
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
