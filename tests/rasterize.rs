use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const MISSING_GS: &str = "pdfraster-test-missing-gs";

fn pdfraster_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pdfraster"))
}

fn tool_available(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Runs the binary with an empty config home so a user config cannot leak in.
fn pdfraster(config_home: &Path, args: &[&str], extra: &[&Path]) -> Output {
    Command::new(pdfraster_bin())
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .args(args)
        .args(extra)
        .output()
        .expect("pdfraster failed to run")
}

fn write_text_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids = Vec::new();
    for index in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("write fixture pdf");
}

#[test]
fn headless_requires_output_dir() {
    let temp = TempDir::new().expect("temp dir");
    let input = temp.path().join("input.pdf");
    write_text_pdf(&input, 1);

    let output = pdfraster(temp.path(), &["--gs", MISSING_GS], &[&input]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("output"), "unexpected stderr: {stderr}");
}

#[test]
fn rejects_out_of_range_dpi() {
    let temp = TempDir::new().expect("temp dir");
    let input = temp.path().join("input.pdf");
    write_text_pdf(&input, 1);
    let out = temp.path().join("out");

    let output = pdfraster(
        temp.path(),
        &["--dpi", "50", "--output-dir"],
        &[&out, &input],
    );
    assert!(!output.status.success());
    assert!(!out.exists());
}

#[test]
fn list_reports_pages_and_unknowns() {
    let temp = TempDir::new().expect("temp dir");
    let good = temp.path().join("good.pdf");
    write_text_pdf(&good, 3);
    let bad = temp.path().join("bad.pdf");
    std::fs::write(&bad, "not a pdf").expect("write bad pdf");

    let output = pdfraster(
        temp.path(),
        &["--list", "--json", "--gs", MISSING_GS],
        &[&good, &bad],
    );
    assert!(output.status.success(), "list failed");
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["title"], "bad.pdf");
    assert!(rows[0]["pages"].is_null());
    assert_eq!(rows[1]["title"], "good.pdf");
    assert_eq!(rows[1]["pages"], 3);
}

#[test]
fn missing_ghostscript_logs_each_document() {
    let temp = TempDir::new().expect("temp dir");
    let first = temp.path().join("first.pdf");
    let second = temp.path().join("second.pdf");
    write_text_pdf(&first, 1);
    write_text_pdf(&second, 1);
    let out = temp.path().join("out");

    let output = pdfraster(
        temp.path(),
        &["--gs", MISSING_GS, "--output-dir"],
        &[&out, &first, &second],
    );
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Console$ : Rasterizing: first.pdf");
    assert!(lines[1].starts_with("Console$ :   -> ERROR:"));
    assert!(lines[1].contains(MISSING_GS));
    assert_eq!(lines[2], "Console$ : Rasterizing: second.pdf");
    assert!(lines[3].starts_with("Console$ :   -> ERROR:"));
    assert!(stdout.contains("Summary: total 2, succeeded 0, failed 2"));
}

#[test]
fn missing_ghostscript_json_summary() {
    let temp = TempDir::new().expect("temp dir");
    let input = temp.path().join("input.pdf");
    write_text_pdf(&input, 1);
    let out = temp.path().join("out");

    let output = pdfraster(
        temp.path(),
        &["--json", "--gs", MISSING_GS, "--output-dir"],
        &[&out, &input],
    );
    assert!(!output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(summary["status"], "failed");
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["failures"].as_array().map(Vec::len), Some(1));
}

#[test]
fn refuses_inputs_sharing_an_output_name() {
    let temp = TempDir::new().expect("temp dir");
    let first = temp.path().join("a");
    let second = temp.path().join("b");
    std::fs::create_dir_all(&first).expect("mkdir a");
    std::fs::create_dir_all(&second).expect("mkdir b");
    write_text_pdf(&first.join("x.pdf"), 1);
    write_text_pdf(&second.join("x.pdf"), 1);
    let out = temp.path().join("out");

    let output = pdfraster(
        temp.path(),
        &["--gs", MISSING_GS, "--output-dir"],
        &[&out, &first.join("x.pdf"), &second.join("x.pdf")],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("x_RASTERIZED.pdf"), "unexpected stderr: {stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Rasterizing"));
}

#[test]
fn rasterizes_with_ghostscript() {
    if !tool_available("gs") {
        eprintln!("skipping rasterize test; Ghostscript not available");
        return;
    }

    let temp = TempDir::new().expect("temp dir");
    let input = temp.path().join("contract.pdf");
    write_text_pdf(&input, 3);
    let out = temp.path().join("out");

    let output = pdfraster(
        temp.path(),
        &["--gs", "gs", "--dpi", "72", "--output-dir"],
        &[&out, &input],
    );
    assert!(output.status.success(), "pdfraster failed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let start = stdout.find("Rasterizing: contract.pdf").expect("start line");
    let done = stdout.find("-> Done:").expect("done line");
    assert!(start < done);

    let result = out.join("contract_RASTERIZED.pdf");
    let doc = Document::load(&result).expect("load output");
    assert_eq!(doc.get_pages().len(), 3);
    for page_id in doc.get_pages().values() {
        let page = doc.get_dictionary(*page_id).expect("page");
        let xobjects = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|resources| resources.get(b"XObject"))
            .and_then(Object::as_dict)
            .expect("xobjects");
        let image_id = xobjects
            .get(b"Im0")
            .and_then(Object::as_reference)
            .expect("image ref");
        let image = doc
            .get_object(image_id)
            .and_then(Object::as_stream)
            .expect("image stream");
        assert_eq!(
            image.dict.get(b"ColorSpace").and_then(Object::as_name).ok(),
            Some(&b"DeviceRGB"[..])
        );
        assert_eq!(
            image.dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok(),
            Some(8)
        );
    }

    let entries: Vec<_> = std::fs::read_dir(&out).expect("read out").collect();
    assert_eq!(entries.len(), 1, "only the output file should remain");
}
