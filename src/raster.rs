use crate::assemble::{self, DocumentMetadata};
use crate::error::RasterError;
use crate::ghostscript;
use std::collections::BTreeMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::Builder;

pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 1200;
pub const DEFAULT_DPI: u32 = 300;
const OUTPUT_SUFFIX: &str = "_RASTERIZED.pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterJob {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub dpi: u32,
    pub strip_metadata: bool,
}

impl RasterJob {
    pub fn output_path(&self) -> PathBuf {
        output_path(&self.output_dir, &self.source)
    }
}

/// Anything that can turn a [`RasterJob`] into an output file.
pub trait Rasterize: Send {
    fn rasterize(&self, job: &RasterJob) -> Result<PathBuf, RasterError>;
}

/// Ghostscript-backed rasterizer.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    program: String,
    scratch_root: Option<PathBuf>,
}

impl Rasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            scratch_root: None,
        }
    }

    /// Stage page images under `root` instead of the system temp dir.
    #[cfg(test)]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn run_ghostscript(&self, source: &Path, scratch: &Path, dpi: u32) -> Result<(), RasterError> {
        let mut command = ghostscript::rasterize_command(&self.program, source, scratch, dpi);
        tracing::debug!(?command, "running rasterizer");
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    RasterError::RasterizerNotFound {
                        program: self.program.clone(),
                    }
                } else {
                    RasterError::io(format!("failed to execute {}", self.program), err)
                }
            })?;
        if !output.status.success() {
            return Err(RasterError::RasterizerFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Rasterize for Rasterizer {
    fn rasterize(&self, job: &RasterJob) -> Result<PathBuf, RasterError> {
        validate_dpi(job.dpi)?;
        fs::create_dir_all(&job.output_dir).map_err(|err| {
            RasterError::io(
                format!("failed to create {}", job.output_dir.display()),
                err,
            )
        })?;

        let mut scratch = Builder::new();
        scratch.prefix(".pdfraster");
        let scratch = match &self.scratch_root {
            Some(root) => scratch.tempdir_in(root),
            None => scratch.tempdir(),
        }
        .map_err(|err| RasterError::io("failed to create scratch directory", err))?;

        self.run_ghostscript(&job.source, scratch.path(), job.dpi)?;

        let pages = page_images(scratch.path())?;
        tracing::debug!(pages = pages.len(), "rasterizer finished");
        let metadata = if job.strip_metadata {
            DocumentMetadata::default()
        } else {
            DocumentMetadata::from_source(&job.source)
        };
        if metadata.is_empty() && !job.strip_metadata {
            tracing::debug!(source = %job.source.display(), "no document info to carry over");
        }
        let mut doc = assemble::assemble(
            pages.iter().map(|page| decode_page(page)),
            job.dpi,
            &metadata,
            &job.source,
        )?;

        let output = job.output_path();
        write_atomically(&mut doc, &output)?;
        tracing::info!(output = %output.display(), "rasterized");
        Ok(output)
    }
}

pub fn validate_dpi(dpi: u32) -> Result<(), RasterError> {
    if (MIN_DPI..=MAX_DPI).contains(&dpi) {
        Ok(())
    } else {
        Err(RasterError::InvalidDpi {
            dpi,
            min: MIN_DPI,
            max: MAX_DPI,
        })
    }
}

pub fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}{OUTPUT_SUFFIX}"))
}

/// Output paths that more than one job would write.
pub fn shared_outputs(jobs: &[RasterJob]) -> Vec<PathBuf> {
    let mut seen = BTreeMap::new();
    for job in jobs {
        *seen.entry(job.output_path()).or_insert(0usize) += 1;
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(path, _)| path)
        .collect()
}

fn page_images(scratch: &Path) -> Result<Vec<PathBuf>, RasterError> {
    let entries = fs::read_dir(scratch)
        .map_err(|err| RasterError::io("failed to read scratch directory", err))?;
    let mut pages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| RasterError::io("failed to read scratch directory", err))?;
        let path = entry.path();
        if path.is_file() {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages)
}

fn decode_page(path: &Path) -> Result<image::RgbImage, RasterError> {
    image::open(path)
        .map(|image| image.to_rgb8())
        .map_err(|source| RasterError::Image {
            path: path.to_path_buf(),
            source,
        })
}

fn write_atomically(doc: &mut lopdf::Document, destination: &Path) -> Result<(), RasterError> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let temp = Builder::new()
        .prefix(".pdfraster.tmp")
        .tempfile_in(parent)
        .map_err(|err| RasterError::io("failed to create temp file", err))?;
    let mut writer = BufWriter::new(temp);
    doc.save_to(&mut writer)
        .map_err(|err| RasterError::io("failed to write output", err))?;
    let temp = writer
        .into_inner()
        .map_err(|err| RasterError::io("failed to write output", err.into_error()))?;
    temp.persist(destination)
        .map_err(|err| RasterError::io("failed to finalize output", err.error))?;
    Ok(())
}
