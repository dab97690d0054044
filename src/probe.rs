use crate::ghostscript;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    Known(u32),
    Unknown,
}

impl fmt::Display for PageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageCount::Known(pages) => write!(f, "{pages}"),
            PageCount::Unknown => f.write_str("?"),
        }
    }
}

impl Serialize for PageCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageCount::Known(pages) => serializer.serialize_u32(*pages),
            PageCount::Unknown => serializer.serialize_none(),
        }
    }
}

/// One row of the file table.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub title: String,
    pub pages: PageCount,
    pub size_kb: Option<u64>,
}

impl DocumentInfo {
    pub fn size_label(&self) -> String {
        match self.size_kb {
            Some(size) => format!("{size} KB"),
            None => "?".to_string(),
        }
    }
}

pub fn describe(path: &Path, gs_program: &str) -> DocumentInfo {
    let title = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .unwrap_or_else(|| path.display().to_string());
    let size_kb = std::fs::metadata(path).ok().map(|meta| meta.len() / 1024);
    DocumentInfo {
        path: path.to_path_buf(),
        title,
        pages: page_count(path, gs_program),
        size_kb,
    }
}

/// Page count of `path`, or `Unknown` if neither lopdf nor Ghostscript can
/// tell.
pub fn page_count(path: &Path, gs_program: &str) -> PageCount {
    match lopdf::Document::load(path) {
        Ok(doc) => {
            let pages = doc.get_pages().len();
            if pages > 0 {
                return PageCount::Known(pages as u32);
            }
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "lopdf could not read document");
        }
    }
    if !path.is_file() {
        return PageCount::Unknown;
    }
    match ghostscript_page_count(path, gs_program) {
        Some(pages) => PageCount::Known(pages),
        None => {
            tracing::warn!(path = %path.display(), "page count unavailable");
            PageCount::Unknown
        }
    }
}

fn ghostscript_page_count(path: &Path, gs_program: &str) -> Option<u32> {
    let output = ghostscript::page_count_command(gs_program, path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    ghostscript::parse_page_count(&String::from_utf8_lossy(&output.stdout))
}
