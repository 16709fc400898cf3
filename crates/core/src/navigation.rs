//! Table of contents: legacy navigation map, then navigation document, then a
//! synthesized one-entry-per-chapter list. The first non-empty result wins.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::package::{self, Package, SpineItem};
use crate::paths;

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub label: String,
    /// Target with the fragment removed.
    pub href: String,
    /// `None` when the target matched no spine item.
    pub spine_index: Option<usize>,
    #[serde(default)]
    pub is_sub_level: bool,
}

impl TocEntry {
    /// Spine index to navigate to. Unresolved targets land on the first chapter.
    pub fn target_index(&self) -> usize {
        self.spine_index.unwrap_or(0)
    }
}

/// Which source produced the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TocSource {
    Ncx,
    NavDocument,
    Synthesized,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableOfContents {
    pub source: TocSource,
    pub entries: Vec<TocEntry>,
}

impl TableOfContents {
    /// First entry pointing at `spine_index`, used for the chapter title.
    pub fn entry_for_spine(&self, spine_index: usize) -> Option<&TocEntry> {
        self.entries
            .iter()
            .find(|e| e.spine_index == Some(spine_index))
    }
}

/// Build the table of contents for an opened package.
pub fn parse_toc(archive: &Archive, package: &Package) -> TableOfContents {
    if let Some(path) = ncx_path(package) {
        if let Some(content) = archive.entry_text(&path) {
            let entries = parse_ncx(&content, &path, package);
            if !entries.is_empty() {
                return TableOfContents {
                    source: TocSource::Ncx,
                    entries,
                };
            }
        }
    }

    if let Some(nav) = package.manifest.iter().find(|e| e.has_property("nav")) {
        let path = package.resolve_href(&nav.href);
        if let Some(content) = archive.entry_text(&path) {
            let entries = parse_nav_document(&content, &path, package);
            if !entries.is_empty() {
                return TableOfContents {
                    source: TocSource::NavDocument,
                    entries,
                };
            }
        }
    }

    TableOfContents {
        source: TocSource::Synthesized,
        entries: synthesize(&package.spine),
    }
}

fn ncx_path(package: &Package) -> Option<String> {
    let declared = package
        .toc_id
        .as_deref()
        .and_then(|id| package.manifest.get(id));
    declared
        .or_else(|| {
            package
                .manifest
                .iter()
                .find(|e| e.media_type == NCX_MEDIA_TYPE)
        })
        .map(|e| package.resolve_href(&e.href))
}

/// Legacy navigation map. Top-level points plus their direct children only.
pub fn parse_ncx(content: &str, ncx_path: &str, package: &Package) -> Vec<TocEntry> {
    let mut reader = XmlReader::from_str(content);
    let mut buf = Vec::new();
    let mut entries = Vec::new();

    // One slot per open navPoint: (label, src, index in `entries`).
    let mut stack: Vec<(String, String, Option<usize>)> = Vec::new();
    let mut in_text = false;
    let mut in_map = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"navMap" => in_map = true,
                b"navPoint" if in_map => {
                    // Parents are emitted before their children.
                    flush_point(&mut stack, &mut entries, ncx_path, package);
                    stack.push((String::new(), String::new(), None));
                }
                b"text" if !stack.is_empty() => in_text = true,
                b"content" => set_src(&mut stack, e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"content" => {
                set_src(&mut stack, e);
            }
            Ok(Event::Text(ref e)) if in_text => {
                if let Some(top) = stack.last_mut() {
                    top.0.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"text" => in_text = false,
                b"navPoint" => {
                    flush_point(&mut stack, &mut entries, ncx_path, package);
                    stack.pop();
                }
                b"navMap" => in_map = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Navigation map parse stopped early: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    entries
}

fn set_src(stack: &mut [(String, String, Option<usize>)], e: &quick_xml::events::BytesStart<'_>) {
    if let Some(top) = stack.last_mut() {
        if top.1.is_empty() {
            top.1 = package::attr(e, b"src").unwrap_or_default();
        }
    }
}

/// Emit the innermost open navPoint once. Points nested deeper than one level are dropped.
fn flush_point(
    stack: &mut [(String, String, Option<usize>)],
    entries: &mut Vec<TocEntry>,
    ncx_path: &str,
    package: &Package,
) {
    let depth = stack.len();
    let Some(top) = stack.last_mut() else {
        return;
    };
    if top.2.is_some() || depth > 2 {
        return;
    }
    top.2 = Some(entries.len());
    let href = paths::strip_query_and_fragment(&top.1).to_string();
    entries.push(TocEntry {
        label: top.0.trim().to_string(),
        spine_index: resolve_spine_index(&href, ncx_path, package),
        href,
        is_sub_level: depth == 2,
    });
}

/// Navigation document: every link of the designated table-of-contents list, flattened.
pub fn parse_nav_document(content: &str, nav_path: &str, package: &Package) -> Vec<TocEntry> {
    let document = scraper::Html::parse_document(content);
    let (Ok(nav_selector), Ok(a_selector)) = (
        scraper::Selector::parse("nav"),
        scraper::Selector::parse("a"),
    ) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for nav in document.select(&nav_selector).filter(|n| is_toc_nav(n)) {
        for a in nav.select(&a_selector) {
            let label = a.text().collect::<String>().trim().to_string();
            let raw_href = a.value().attr("href").unwrap_or("");
            let href = paths::strip_query_and_fragment(raw_href).to_string();
            let list_depth = a
                .ancestors()
                .take_while(|n| n.id() != nav.id())
                .filter_map(scraper::ElementRef::wrap)
                .filter(|el| el.value().name() == "li")
                .count();
            entries.push(TocEntry {
                label,
                spine_index: resolve_spine_index(&href, nav_path, package),
                href,
                is_sub_level: list_depth > 1,
            });
        }
    }
    entries
}

fn is_toc_nav(nav: &scraper::ElementRef<'_>) -> bool {
    let el = nav.value();
    el.attr("epub:type")
        .is_some_and(|t| t.split_whitespace().any(|t| t == "toc"))
        || el.classes().any(|c| c == "toc")
        || el.attr("role") == Some("doc-toc")
}

/// "Chapter N" for every spine item.
pub fn synthesize(spine: &[SpineItem]) -> Vec<TocEntry> {
    spine
        .iter()
        .enumerate()
        .map(|(i, item)| TocEntry {
            label: format!("Chapter {}", i + 1),
            href: item.href.clone(),
            spine_index: Some(i),
            is_sub_level: false,
        })
        .collect()
}

/// Match a TOC target against the spine: exact or suffix match on the raw href,
/// then on archive paths resolved relative to the TOC document.
pub fn resolve_spine_index(href: &str, toc_path: &str, package: &Package) -> Option<usize> {
    if href.is_empty() {
        return None;
    }
    let spine = &package.spine;
    let found = spine
        .iter()
        .position(|s| s.href == href || s.href.ends_with(href))
        .or_else(|| {
            let target = paths::normalize(&format!(
                "{}{}",
                paths::parent_dir(toc_path),
                paths::decode_href(href)
            ));
            spine
                .iter()
                .position(|s| package.resolve_href(&s.href) == target)
        });
    if found.is_none() {
        tracing::debug!("TOC target '{}' matches no spine item", href);
    }
    found
}
