//! Loader progress: the stages a book goes through before it can be read,
//! reported to whatever shows the spinner text.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Download,
    Parse,
    Render,
    Paginate,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadStage::Download => "Downloading book",
            LoadStage::Parse => "Reading package",
            LoadStage::Render => "Rendering",
            LoadStage::Paginate => "Paginating",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: LoadStage,
    pub current: u64,
    pub total: Option<u64>,
    pub message: Option<String>,
}

/// Receives loader progress. Implement this for a progress bar or status line.
pub trait ProgressHandler: Send {
    fn on_progress(&self, event: ProgressEvent);
}

/// Emit a progress event if a handler is provided.
pub fn emit_progress(
    handler: Option<&dyn ProgressHandler>,
    stage: LoadStage,
    current: u64,
    total: Option<u64>,
    message: Option<&str>,
) {
    if let Some(h) = handler {
        h.on_progress(ProgressEvent {
            stage,
            current,
            total,
            message: message.map(|s| s.to_string()),
        });
    }
}
