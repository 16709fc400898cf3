/// Top-level error type. Every fatal load-time failure surfaces as this.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Malformed package: {0}")]
    Package(#[from] PackageError),
}

impl ReaderError {
    /// Single user-facing message shown when loading aborts.
    pub fn user_message(&self) -> &'static str {
        match self {
            ReaderError::Fetch(_) => "Could not download the book. Please try again.",
            ReaderError::Archive(_) => "The book file is damaged or unsupported.",
            ReaderError::Package(_) => "The book package is malformed.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Invalid ZIP archive: {0}")]
    Format(String),

    #[error(transparent)]
    Security(#[from] SecurityError),
}

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Missing required file: META-INF/container.xml")]
    MissingContainer,

    #[error("No rootfile full-path found in container.xml")]
    MissingRootfile,

    #[error("Package descriptor not found in archive: {0}")]
    MissingDescriptor(String),

    #[error("Failed to parse {path}: {detail}")]
    Xml { path: String, detail: String },

    #[error("Spine contains no readable content documents")]
    EmptySpine,
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("ZIP bomb detected: decompression ratio {ratio}:1 exceeds limit {limit}:1")]
    ZipBomb { ratio: u64, limit: u64 },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedResource {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error("Path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },
}

/// A single chapter could not be rendered. Recovered: the chapter is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ChapterRenderError {
    #[error("Spine item not found in archive: {path}")]
    Missing { path: String },

    #[error("Content document has no body: {path}")]
    NoBody { path: String },
}

/// An image reference matched no archive entry. Recovered: the image stays broken.
#[derive(Debug, thiserror::Error)]
#[error("Unresolved image '{src}' in {chapter}")]
pub struct ImageResolutionFailure {
    pub src: String,
    pub chapter: String,
}

/// A progress, bookmark or settings call failed. Recovered: reading continues.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Network error calling {endpoint}: {detail}")]
    Network { endpoint: String, detail: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid response from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },
}
