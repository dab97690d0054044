use std::path::Path;
use std::process::Command;

const PAGE_PATTERN: &str = "page_%04d.png";
const DEVICE: &str = "png16m";

pub fn default_program() -> &'static str {
    if cfg!(windows) { "gswin64c" } else { "gs" }
}

/// Command that renders every page of `source` into `scratch` as RGB PNGs.
pub fn rasterize_command(program: &str, source: &Path, scratch: &Path, dpi: u32) -> Command {
    let pattern = scratch.join(PAGE_PATTERN);
    let mut output_arg = std::ffi::OsString::from("-sOutputFile=");
    output_arg.push(pattern.as_os_str());

    let mut command = Command::new(program);
    command
        .arg("-dSAFER")
        .arg("-dBATCH")
        .arg("-dNOPAUSE")
        .arg(format!("-sDEVICE={DEVICE}"))
        .arg(format!("-r{dpi}"))
        .arg(output_arg)
        .arg(source);
    command
}

/// Command that prints the page count of `source` as its last output token.
pub fn page_count_command(program: &str, source: &Path) -> Command {
    let script = format!(
        "({}) (r) file runpdfbegin pdfpagecount = quit",
        escape_ps_string(&source.to_string_lossy())
    );
    let mut command = Command::new(program);
    command
        .arg("-q")
        .arg("-dNODISPLAY")
        .arg("-dNOSAFER")
        .arg("-c")
        .arg(script);
    command
}

pub fn parse_page_count(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .last()
        .and_then(|token| token.parse::<u32>().ok())
        .filter(|pages| *pages > 0)
}

fn escape_ps_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn rasterize_flags_end_with_source() {
        let command = rasterize_command(
            "gs",
            Path::new("/docs/report.pdf"),
            Path::new("/tmp/scratch"),
            300,
        );
        let args = args(&command);
        assert_eq!(command.get_program(), "gs");
        assert_eq!(
            args[..5],
            ["-dSAFER", "-dBATCH", "-dNOPAUSE", "-sDEVICE=png16m", "-r300"]
        );
        assert!(args[5].starts_with("-sOutputFile="));
        assert!(args[5].ends_with("page_%04d.png"));
        assert_eq!(args.last().map(String::as_str), Some("/docs/report.pdf"));
    }

    #[test]
    fn page_count_script_escapes_path() {
        let command = page_count_command("gs", Path::new("/docs/a (draft).pdf"));
        let args = args(&command);
        assert_eq!(args[..4], ["-q", "-dNODISPLAY", "-dNOSAFER", "-c"]);
        assert_eq!(
            args[4],
            "(/docs/a \\(draft\\).pdf) (r) file runpdfbegin pdfpagecount = quit"
        );
    }

    #[test]
    fn escape_backslashes() {
        assert_eq!(escape_ps_string(r"C:\a\b.pdf"), r"C:\\a\\b.pdf");
    }

    #[test]
    fn parses_last_token() {
        assert_eq!(parse_page_count("12\n"), Some(12));
        assert_eq!(parse_page_count("GPL Ghostscript warning\n 7"), Some(7));
        assert_eq!(parse_page_count("Error: /undefinedfilename"), None);
        assert_eq!(parse_page_count(""), None);
        assert_eq!(parse_page_count("0"), None);
    }
}
