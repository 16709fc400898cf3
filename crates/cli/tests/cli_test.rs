//! Basic CLI integration tests.

#![allow(deprecated)] // Command::cargo_bin deprecated for custom build-dir; still works for default

use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use pretty_assertions::assert_eq;

fn write_epub(dir: &Path) -> PathBuf {
    let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
    let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Quincas Borba</dc:title><dc:creator>Machado de Assis</dc:creator><dc:language>pt</dc:language>
  </metadata>
  <manifest>
    <item id="c1" href="text/c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/c2.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="images/dog.png" media-type="image/png"/>
  </manifest>
  <spine><itemref idref="c1"/><itemref idref="c2"/></spine>
</package>"#;
    let c1 = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
<h1>I</h1><p>Rubião fitava a enseada.</p><script>track()</script>
<img src="../images/dog.png" alt="dog"/></body></html>"#;
    let c2 = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><h1>II</h1><p>Que abismo.</p></body></html>"#;

    let path = dir.join("book.epub");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    for (name, data) in [
        ("mimetype", "application/epub+zip".as_bytes()),
        ("META-INF/container.xml", container.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/text/c1.xhtml", c1.as_bytes()),
        ("OEBPS/text/c2.xhtml", c2.as_bytes()),
        ("OEBPS/images/dog.png", b"\x89PNG\r\n".as_slice()),
    ] {
        zip.start_file(name, opts).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn cmd() -> Command {
    Command::cargo_bin("retroreader").unwrap()
}

#[test]
fn help_prints_and_exits_success() {
    cmd().arg("--help").assert().success();
}

#[test]
fn config_show_json_valid() {
    let out = cmd().args(["config", "show", "--json"]).assert().success();
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(stdout).expect("config show --json should output valid JSON");
    assert!(value.get("reader").is_some());
}

#[test]
fn info_reports_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let epub = write_epub(dir.path());
    let out = cmd()
        .args(["info", epub.to_str().unwrap(), "--json"])
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(value["metadata"]["title"], "Quincas Borba");
    assert_eq!(value["metadata"]["author"], "Machado de Assis");
    assert_eq!(value["spine_items"], 2);
    assert_eq!(value["toc_source"], "synthesized");
}

#[test]
fn toc_lists_synthesized_chapters() {
    let dir = tempfile::tempdir().unwrap();
    let epub = write_epub(dir.path());
    let out = cmd().args(["toc", epub.to_str().unwrap()]).assert().success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert_eq!(stdout, "Chapter 1 -> #0\nChapter 2 -> #1\n");
}

#[test]
fn render_writes_sanitized_page() {
    let dir = tempfile::tempdir().unwrap();
    let epub = write_epub(dir.path());
    let html_path = dir.path().join("book.html");
    cmd()
        .args([
            "render",
            epub.to_str().unwrap(),
            "-o",
            html_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let html = std::fs::read_to_string(&html_path).unwrap();
    assert!(html.contains("Rubião fitava a enseada."));
    assert!(!html.contains("track()"));
    assert!(html.contains("src=\"data:image/png;base64,"));
    assert_eq!(html.matches("class=\"chapter-block\"").count(), 2);
}

#[test]
fn paginate_opens_requested_page() {
    let dir = tempfile::tempdir().unwrap();
    let epub = write_epub(dir.path());
    let out = cmd()
        .args([
            "paginate",
            epub.to_str().unwrap(),
            "--width",
            "600",
            "--height",
            "800",
            "--page",
            "99",
            "--json",
        ])
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    let total = value["view"]["total_pages"].as_u64().unwrap();
    assert!(total >= 2);
    assert_eq!(value["view"]["page"].as_u64(), Some(total));
    assert_eq!(value["position"], format!("page:{total}:{total}"));
    assert_eq!(value["chapters"][0]["page"], 1);
}

#[test]
fn paginate_rejects_unknown_font() {
    let dir = tempfile::tempdir().unwrap();
    let epub = write_epub(dir.path());
    cmd()
        .args(["paginate", epub.to_str().unwrap(), "--font", "comic"])
        .assert()
        .failure();
}

#[test]
fn missing_file_fails() {
    cmd()
        .args(["info", "/nonexistent/file.epub"])
        .assert()
        .failure();
}

#[test]
fn non_epub_fails_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.epub");
    std::fs::write(&path, b"plain text, not a zip").unwrap();
    let out = cmd()
        .args(["info", path.to_str().unwrap()])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&out.get_output().stderr).to_string();
    assert!(stderr.contains("Error:"));
}
