//! Image reference resolution and the handles that stand in for archive bytes.

use std::collections::HashMap;

use base64::Engine;

use super::dom::RenderNode;
use crate::archive::Archive;
use crate::error::ImageResolutionFailure;
use crate::package::Package;
use crate::paths;

/// Creates locally resolvable handles for image bytes. Every handle created
/// must be released by `release_all` when the session ends.
pub trait BlobStore: Send {
    fn create(&mut self, path: &str, media_type: &str, bytes: &[u8]) -> String;

    /// Release every handle created so far. Returns how many were released.
    fn release_all(&mut self) -> usize;
}

/// Inline `data:` URIs. Nothing to revoke, but the count is still tracked.
#[derive(Debug, Default)]
pub struct DataUriStore {
    live: usize,
}

impl BlobStore for DataUriStore {
    fn create(&mut self, _path: &str, media_type: &str, bytes: &[u8]) -> String {
        self.live += 1;
        format!(
            "data:{};base64,{}",
            media_type,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn release_all(&mut self) -> usize {
        std::mem::take(&mut self.live)
    }
}

/// Archive path → handle. Built lazily during render, never rebuilt.
#[derive(Debug, Default, Clone)]
pub struct ImageBindings {
    handles: HashMap<String, String>,
}

impl ImageBindings {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.handles.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }

    /// Resolve a reference found in the chapter at `chapter_href` (descriptor-relative)
    /// to a handle, creating and caching it on first use.
    pub fn resolve(
        &mut self,
        src: &str,
        chapter_href: &str,
        archive: &Archive,
        package: &Package,
        store: &mut dyn BlobStore,
    ) -> Result<String, ImageResolutionFailure> {
        let decoded = paths::decode_href(paths::strip_query_and_fragment(src));
        let chapter_dir = paths::parent_dir(chapter_href);

        let primary = paths::normalize(&format!("{}{}{}", package.base_path, chapter_dir, decoded));
        if let Some(handle) = self.handles.get(&primary) {
            return Ok(handle.clone());
        }

        let path = find_image(&primary, &decoded, chapter_dir, archive).ok_or_else(|| {
            ImageResolutionFailure {
                src: src.to_string(),
                chapter: chapter_href.to_string(),
            }
        })?;
        if let Some(handle) = self.handles.get(&path) {
            return Ok(handle.clone());
        }

        let bytes = archive.entry(&path).ok_or_else(|| ImageResolutionFailure {
            src: src.to_string(),
            chapter: chapter_href.to_string(),
        })?;
        let handle = store.create(&path, &media_type_for(&path, package), bytes);
        self.handles.insert(path, handle.clone());
        Ok(handle)
    }
}

/// Descriptor + chapter relative path, then chapter relative path alone,
/// then the first archive entry with the same basename.
fn find_image(primary: &str, src: &str, chapter_dir: &str, archive: &Archive) -> Option<String> {
    if archive.contains(primary) {
        return Some(primary.to_string());
    }
    let without_base = paths::normalize(&format!("{chapter_dir}{src}"));
    if archive.contains(&without_base) {
        return Some(without_base);
    }
    archive
        .find_entries_by_name(paths::basename(src))
        .first()
        .map(|p| p.to_string())
}

fn media_type_for(path: &str, package: &Package) -> String {
    if let Some(entry) = package
        .manifest
        .iter()
        .find(|e| package.resolve_href(&e.href) == path)
    {
        if !entry.media_type.is_empty() {
            return entry.media_type.clone();
        }
    }
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Rewrite every `img[src]` and svg `image[href]` under `nodes`.
/// Unresolved references are left untouched.
pub fn resolve_images(
    nodes: &mut [RenderNode],
    chapter_href: &str,
    bindings: &mut ImageBindings,
    archive: &Archive,
    package: &Package,
    store: &mut dyn BlobStore,
) {
    for node in nodes.iter_mut() {
        node.walk_mut(&mut |n| {
            let is_svg = match n.name() {
                Some("img") => false,
                Some("image") => true,
                _ => return,
            };
            let src = if is_svg {
                n.attr("href").or_else(|| n.attr("xlink:href"))
            } else {
                n.attr("src")
            };
            let Some(src) = src.map(str::to_string) else {
                return;
            };
            if src.is_empty() || src.starts_with("data:") || src.starts_with("blob:") {
                return;
            }
            match bindings.resolve(&src, chapter_href, archive, package, store) {
                Ok(handle) if is_svg => {
                    n.set_attr("href", &handle);
                    n.set_attr("xlink:href", &handle);
                }
                Ok(handle) => n.set_attr("src", &handle),
                Err(e) => tracing::debug!("{}", e),
            }
        });
    }
}
