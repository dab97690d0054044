use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("DPI must be between {min} and {max}, got {dpi}")]
    InvalidDpi { dpi: u32, min: u32, max: u32 },

    #[error("rasterizer '{program}' not found; install Ghostscript or pass --gs")]
    RasterizerNotFound { program: String },

    #[error("{program} exited with status {status}: {stderr}")]
    RasterizerFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The rasterizer succeeded but wrote no page images.
    #[error("no pages were rasterized from '{}'", source_path.display())]
    NoPages { source_path: PathBuf },

    #[error("failed to decode page image '{}': {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to build output PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RasterError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RasterError::Io {
            context: context.into(),
            source,
        }
    }
}
