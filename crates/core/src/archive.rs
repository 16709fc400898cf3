//! Archive loader: fetch a packaged book as bytes, decompress it once, and
//! expose entries by exact path or by basename.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::ArchiveError;
use crate::security::{self, ExtractionBudget, SecurityLimits};

/// Fully decompressed package. Entry bytes are owned for the session lifetime.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
}

impl Archive {
    /// Decompress a ZIP container held in memory.
    pub fn from_bytes(bytes: &[u8], limits: &SecurityLimits) -> Result<Self, ArchiveError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ArchiveError::Format(e.to_string()))?;

        let mut budget = ExtractionBudget::new(zip.len(), limits)?;

        let mut archive = Archive::default();
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| ArchiveError::Format(e.to_string()))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            if security::is_unsafe_entry_name(&name) {
                tracing::warn!("Skipping archive entry with unsafe name: {}", name);
                continue;
            }
            budget.admit(&name, file.compressed_size(), file.size())?;

            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| ArchiveError::Format(format!("Failed to read {name}: {e}")))?;
            budget.consume(&name, data.len() as u64)?;

            archive.insert(name, data);
        }

        tracing::info!(
            "Archive opened: {} entries, {} KB decompressed",
            archive.len(),
            budget.consumed() / 1024
        );
        Ok(archive)
    }

    fn insert(&mut self, name: String, data: Vec<u8>) {
        match self.index.get(&name) {
            Some(&i) => self.entries[i].data = data,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push(ArchiveEntry { name, data });
            }
        }
    }

    /// Exact, case-sensitive lookup. Absent entries are common, so this is not an error.
    pub fn entry(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&i| self.entries[i].data.as_slice())
    }

    /// Entry decoded as text (UTF-8, lossy, BOM stripped).
    pub fn entry_text(&self, path: &str) -> Option<String> {
        self.entry(path).map(decode_text)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Every entry whose basename equals `filename`, in archive order.
    /// Last-resort lookup for references with broken relative paths.
    pub fn find_entries_by_name(&self, filename: &str) -> Vec<&str> {
        let filename = filename.rsplit('/').next().unwrap_or(filename);
        if filename.is_empty() {
            return Vec::new();
        }
        let suffix = format!("/{filename}");
        self.entries
            .iter()
            .filter(|e| e.name == filename || e.name.ends_with(&suffix))
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Download a package and open it.
#[cfg(feature = "remote")]
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    limits: &SecurityLimits,
) -> Result<Archive, crate::error::ReaderError> {
    use crate::error::FetchError;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    tracing::info!("Downloaded {} ({} KB)", url, bytes.len() / 1024);

    Ok(Archive::from_bytes(&bytes, limits)?)
}
