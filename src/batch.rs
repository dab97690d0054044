use crate::detect::is_pdf;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn collect_sources(
    sources: &[String],
    stdin_sources: Vec<String>,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let mut paths = BTreeSet::new();
    for input in sources.iter().chain(stdin_sources.iter()) {
        if looks_like_glob(input) {
            for path in glob(input).context("invalid glob pattern")?.flatten() {
                add_path(&mut paths, &path, recursive)?;
            }
            continue;
        }
        add_path(&mut paths, &expand_tilde(input), recursive)?;
    }
    Ok(paths.into_iter().collect())
}

fn add_path(paths: &mut BTreeSet<PathBuf>, path: &Path, recursive: bool) -> Result<()> {
    if path.is_dir() {
        if recursive {
            for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    paths.insert(entry.path().to_path_buf());
                }
            }
        } else {
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("read directory {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_pdf(&entry_path) {
                    paths.insert(entry_path);
                }
            }
        }
        return Ok(());
    }
    if path.exists() {
        paths.insert(path.to_path_buf());
        return Ok(());
    }
    if looks_like_glob(path.to_string_lossy().as_ref()) {
        return Ok(());
    }
    bail!("input not found: {}", path.display());
}

fn looks_like_glob(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}

pub fn expand_tilde(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(value)
}
