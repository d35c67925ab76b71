use thiserror::Error;

/// Input could not be turned into a table.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read input '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in '{path}': {source}")]
    Malformed {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Input '{path}' is empty (no header row)")]
    Empty { path: String },
}

/// An output artifact could not be produced or written.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot write '{path}': {source}")]
    Unwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Chart drawing failed: {message}")]
    Chart { message: String },

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("PDF generation failed: {0}")]
    Pdf(#[from] printpdf::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Output,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ReportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReportError::Load(_) => ErrorCategory::Input,
            ReportError::Render(_) => ErrorCategory::Output,
            ReportError::ConfigError { .. }
            | ReportError::InvalidConfigValueError { .. }
            | ReportError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ReportError::IoError(_) | ReportError::TaskError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ReportError::ConfigError { .. }
            | ReportError::InvalidConfigValueError { .. }
            | ReportError::MissingConfigError { .. } => ErrorSeverity::Medium,
            ReportError::Load(_) => ErrorSeverity::High,
            ReportError::Render(_) | ReportError::IoError(_) | ReportError::TaskError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Process exit code for this failure. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ReportError::Load(LoadError::Unreadable { path, .. }) => {
                format!("Could not open the input file '{}'", path)
            }
            ReportError::Load(LoadError::Malformed { path, .. }) => {
                format!("The input file '{}' is not valid CSV", path)
            }
            ReportError::Load(LoadError::Empty { path }) => {
                format!("The input file '{}' has no header row", path)
            }
            ReportError::Render(RenderError::Unwritable { path, .. }) => {
                format!("Could not write '{}'", path)
            }
            ReportError::Render(e) => format!("Report rendering failed: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ReportError::Load(LoadError::Unreadable { .. }) => {
                "Check that the input path exists and is readable"
            }
            ReportError::Load(_) => {
                "Make sure the file is comma-delimited UTF-8 text with a header row"
            }
            ReportError::Render(RenderError::Unwritable { .. }) | ReportError::IoError(_) => {
                "Check that the output directory is writable and the disk is not full"
            }
            ReportError::Render(_) => "Re-run with --verbose and inspect the chart inputs",
            ReportError::TaskError(_) => "Re-run the report; a rendering worker stopped unexpectedly",
            ReportError::ConfigError { .. }
            | ReportError::InvalidConfigValueError { .. }
            | ReportError::MissingConfigError { .. } => {
                "Fix the configuration value and run again (see --help)"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
