//! In-memory EPUB fixtures.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use retroreader_core::archive::Archive;
use retroreader_core::security::SecurityLimits;

struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
    properties: Option<String>,
}

/// Builds a minimal but valid package: container index, descriptor under
/// `OEBPS/`, one XHTML document per chapter and any extra entries.
pub struct EpubBuilder {
    title: Option<String>,
    author: Option<String>,
    language: Option<String>,
    manifest: Vec<ManifestItem>,
    spine: Vec<String>,
    spine_toc: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl Default for EpubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self {
            title: None,
            author: None,
            language: None,
            manifest: Vec::new(),
            spine: Vec::new(),
            spine_toc: None,
            files: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Add a spine document at `href` (relative to `OEBPS/`) with `body` as
    /// the contents of its `<body>`.
    pub fn chapter(mut self, href: &str, body: &str) -> Self {
        let id = format!("ch{}", self.spine.len() + 1);
        let doc = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>{id}</title></head>\
             <body>{body}</body></html>"
        );
        self.files.push((format!("OEBPS/{href}"), doc.into_bytes()));
        self.manifest.push(ManifestItem {
            id: id.clone(),
            href: href.to_string(),
            media_type: "application/xhtml+xml".into(),
            properties: None,
        });
        self.spine.push(id);
        self
    }

    /// Declare a spine item without writing its document.
    pub fn missing_chapter(mut self, href: &str) -> Self {
        let id = format!("ch{}", self.spine.len() + 1);
        self.manifest.push(ManifestItem {
            id: id.clone(),
            href: href.to_string(),
            media_type: "application/xhtml+xml".into(),
            properties: None,
        });
        self.spine.push(id);
        self
    }

    /// Add a manifest item and its content.
    pub fn resource(
        mut self,
        id: &str,
        href: &str,
        media_type: &str,
        properties: Option<&str>,
        content: &[u8],
    ) -> Self {
        self.manifest.push(ManifestItem {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: properties.map(String::from),
        });
        self.files.push((format!("OEBPS/{href}"), content.to_vec()));
        self
    }

    /// Add an archive entry that the manifest does not mention.
    pub fn raw(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    pub fn spine_toc(mut self, id: &str) -> Self {
        self.spine_toc = Some(id.to_string());
        self
    }

    fn descriptor(&self) -> String {
        let mut meta = String::new();
        if let Some(t) = &self.title {
            meta.push_str(&format!("<dc:title>{t}</dc:title>"));
        }
        if let Some(a) = &self.author {
            meta.push_str(&format!("<dc:creator>{a}</dc:creator>"));
        }
        if let Some(l) = &self.language {
            meta.push_str(&format!("<dc:language>{l}</dc:language>"));
        }

        let mut manifest = String::new();
        for item in &self.manifest {
            let props = item
                .properties
                .as_deref()
                .map(|p| format!(" properties=\"{p}\""))
                .unwrap_or_default();
            manifest.push_str(&format!(
                "<item id=\"{}\" href=\"{}\" media-type=\"{}\"{props}/>",
                item.id, item.href, item.media_type
            ));
        }

        let spine: String = self
            .spine
            .iter()
            .map(|id| format!("<itemref idref=\"{id}\"/>"))
            .collect();
        let toc_attr = self
            .spine_toc
            .as_deref()
            .map(|id| format!(" toc=\"{id}\""))
            .unwrap_or_default();

        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\">\
             <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">{meta}</metadata>\
             <manifest>{manifest}</manifest>\
             <spine{toc_attr}>{spine}</spine>\
             </package>"
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let container = "<?xml version=\"1.0\"?>\
            <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\
            <rootfiles><rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/></rootfiles>\
            </container>";

        let mut entries: Vec<(String, Vec<u8>)> = vec![
            ("mimetype".into(), b"application/epub+zip".to_vec()),
            ("META-INF/container.xml".into(), container.as_bytes().to_vec()),
            ("OEBPS/content.opf".into(), self.descriptor().into_bytes()),
        ];
        entries.extend(self.files.iter().cloned());
        zip_of(&entries)
    }

    pub fn archive(&self) -> Archive {
        Archive::from_bytes(&self.build(), &SecurityLimits::default()).unwrap()
    }
}

pub fn zip_of(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(name.as_str(), opts).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// `count` chapters of `paragraphs` paragraphs each.
pub fn long_book(count: usize, paragraphs: usize) -> EpubBuilder {
    let para = "<p>It was a bright cold day in April, and the clocks were striking thirteen. \
                Winston Smith, his chin nuzzled into his breast in an effort to escape the vile wind, \
                slipped quickly through the glass doors of Victory Mansions.</p>";
    let mut builder = EpubBuilder::new().title("Long Book").author("Anon");
    for i in 1..=count {
        let body = format!("<h1>Chapter {i}</h1>{}", para.repeat(paragraphs));
        builder = builder.chapter(&format!("text/ch{i}.xhtml"), &body);
    }
    builder
}
