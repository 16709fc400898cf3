//! Package parser: container index → package descriptor → manifest, spine, metadata.
//!
//! Every href found inside the descriptor is relative to the descriptor's own
//! directory (`base_path`), never to the archive root.

use std::collections::{BTreeSet, HashMap};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::archive::Archive;
use crate::error::PackageError;
use crate::paths;

/// Fixed location of the container index inside every package.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    /// Relative to the descriptor directory.
    pub href: String,
    pub media_type: String,
    pub properties: BTreeSet<String>,
}

impl ManifestEntry {
    pub fn is_markup(&self) -> bool {
        self.media_type.contains("html")
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains(property)
    }
}

/// Id-keyed resource registry. Iteration follows declaration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Manifest {
    fn insert(&mut self, entry: ManifestEntry) {
        match self.index.get(&entry.id) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpineItem {
    pub id: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
}

impl Metadata {
    /// Fill absent fields from host-supplied values.
    pub fn with_fallback(mut self, title: Option<&str>, author: Option<&str>) -> Self {
        if self.title.is_none() {
            self.title = title.filter(|t| !t.is_empty()).map(String::from);
        }
        if self.author.is_none() {
            self.author = author.filter(|a| !a.is_empty()).map(String::from);
        }
        self
    }
}

/// Static model of an opened package.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub descriptor_path: String,
    /// Directory of the descriptor, with trailing slash (or empty at root).
    pub base_path: String,
    pub manifest: Manifest,
    pub spine: Vec<SpineItem>,
    pub metadata: Metadata,
    /// `spine@toc`: manifest id of the legacy navigation map, if declared.
    pub toc_id: Option<String>,
}

impl Package {
    pub fn open(archive: &Archive) -> Result<Self, PackageError> {
        let descriptor_path = parse_container_index(archive)?;
        let base_path = paths::parent_dir(&descriptor_path).to_string();

        let descriptor = archive
            .entry_text(&descriptor_path)
            .ok_or_else(|| PackageError::MissingDescriptor(descriptor_path.clone()))?;

        let manifest = parse_manifest(&descriptor).map_err(|detail| PackageError::Xml {
            path: descriptor_path.clone(),
            detail,
        })?;
        let spine = parse_spine(&descriptor, &manifest).map_err(|detail| PackageError::Xml {
            path: descriptor_path.clone(),
            detail,
        })?;
        if spine.is_empty() {
            return Err(PackageError::EmptySpine);
        }
        let metadata = parse_metadata(&descriptor);
        let toc_id = parse_spine_toc_id(&descriptor);

        tracing::info!(
            "Package {}: {} manifest items, {} spine items",
            descriptor_path,
            manifest.len(),
            spine.len()
        );

        Ok(Package {
            descriptor_path,
            base_path,
            manifest,
            spine,
            metadata,
            toc_id,
        })
    }

    /// Archive path for a descriptor-relative href.
    pub fn resolve_href(&self, href: &str) -> String {
        let href = paths::decode_href(paths::strip_query_and_fragment(href));
        paths::normalize(&format!("{}{}", self.base_path, href))
    }
}

/// Read the container index and return the package descriptor path.
pub fn parse_container_index(archive: &Archive) -> Result<String, PackageError> {
    let container = archive
        .entry_text(CONTAINER_PATH)
        .ok_or(PackageError::MissingContainer)?;

    let mut reader = XmlReader::from_str(&container);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(path) = attr(e, b"full-path").filter(|p| !p.is_empty()) {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PackageError::Xml {
                    path: CONTAINER_PATH.to_string(),
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Err(PackageError::MissingRootfile)
}

/// Declared manifest items. Items without an id are skipped.
pub fn parse_manifest(descriptor: &str) -> Result<Manifest, String> {
    let mut reader = XmlReader::from_str(descriptor);
    let mut buf = Vec::new();
    let mut manifest = Manifest::default();
    let mut in_manifest = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"manifest" => {
                in_manifest = true;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"manifest" => {
                in_manifest = false;
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if in_manifest && e.local_name().as_ref() == b"item" =>
            {
                match attr(e, b"id").filter(|id| !id.is_empty()) {
                    Some(id) => {
                        let properties = attr(e, b"properties")
                            .map(|p| p.split_whitespace().map(String::from).collect())
                            .unwrap_or_default();
                        manifest.insert(ManifestEntry {
                            id,
                            href: attr(e, b"href").unwrap_or_default(),
                            media_type: attr(e, b"media-type").unwrap_or_default(),
                            properties,
                        });
                    }
                    None => tracing::debug!("Skipping manifest item without id"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(manifest)
}

/// Reading order. Only references to markup documents present in the manifest survive.
pub fn parse_spine(descriptor: &str, manifest: &Manifest) -> Result<Vec<SpineItem>, String> {
    let mut reader = XmlReader::from_str(descriptor);
    let mut buf = Vec::new();
    let mut spine = Vec::new();
    let mut in_spine = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"spine" => {
                in_spine = true;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"spine" => {
                in_spine = false;
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if in_spine && e.local_name().as_ref() == b"itemref" =>
            {
                if let Some(idref) = attr(e, b"idref") {
                    match manifest.get(&idref) {
                        Some(item) if item.is_markup() => spine.push(SpineItem {
                            id: idref,
                            href: item.href.clone(),
                        }),
                        Some(item) => {
                            tracing::debug!(
                                "Spine item '{}' is {}, skipped",
                                idref,
                                item.media_type
                            )
                        }
                        None => tracing::debug!("Spine references missing manifest id '{}'", idref),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(spine)
}

/// Best-effort title/author/language. Never fails; a parse error keeps what was read so far.
pub fn parse_metadata(descriptor: &str) -> Metadata {
    let mut reader = XmlReader::from_str(descriptor);
    let mut buf = Vec::new();
    let mut metadata = Metadata::default();

    let mut in_metadata = false;
    let mut current: Option<&'static str> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata => current = Some("title"),
                b"creator" if in_metadata => current = Some("creator"),
                b"language" if in_metadata => current = Some("language"),
                _ => {}
            },
            Ok(Event::Text(ref e)) if current.is_some() => {
                text.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::CData(ref e)) if current.is_some() => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"metadata" {
                    in_metadata = false;
                }
                if let Some(field) = current.take() {
                    let value: String = text.trim().nfc().collect();
                    let slot = match field {
                        "title" => &mut metadata.title,
                        "creator" => &mut metadata.author,
                        _ => &mut metadata.language,
                    };
                    if slot.is_none() && !value.is_empty() {
                        *slot = Some(value);
                    }
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Metadata parse stopped early: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    metadata
}

fn parse_spine_toc_id(descriptor: &str) -> Option<String> {
    let mut reader = XmlReader::from_str(descriptor);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"spine" =>
            {
                return attr(e, b"toc").filter(|id| !id.is_empty());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

pub(crate) fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}
