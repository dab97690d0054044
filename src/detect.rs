use std::path::Path;

const PDF_MIME: &str = "application/pdf";

/// True when `path` has a `.pdf` extension or starts with PDF magic bytes.
pub fn is_pdf(path: &Path) -> bool {
    has_pdf_extension(path) || sniff_mime(path).as_deref() == Some(PDF_MIME)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn sniff_mime(path: &Path) -> Option<String> {
    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extension_is_case_insensitive() {
        assert!(has_pdf_extension(Path::new("Scan.PDF")));
        assert!(!has_pdf_extension(Path::new("scan.pdf.txt")));
    }

    #[test]
    fn sniffs_magic_without_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("download");
        std::fs::write(&path, b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        assert!(is_pdf(&path));

        let text = temp.path().join("readme");
        std::fs::write(&text, b"hello").unwrap();
        assert!(!is_pdf(&text));
    }
}
