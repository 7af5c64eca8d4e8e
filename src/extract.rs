//! Text extraction from statement and chart documents.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};

/// Document kinds the extractor can read, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    /// Text that was already extracted, read verbatim.
    Text,
}

impl DocumentKind {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn compute_checksum(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(feature = "pdf")]
fn pdf_text(data: &[u8]) -> std::result::Result<String, String> {
    pdf_extract::extract_text_from_mem(data).map_err(|e| e.to_string())
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(_data: &[u8]) -> std::result::Result<String, String> {
    Err("built without PDF support".to_string())
}

/// Extract the text of `path`, giving up after `timeout`.
///
/// PDF decoding runs on a worker thread so a pathological document cannot
/// hang the batch. A worker that panics or overruns is reported as an
/// unsupported file; the thread is left to finish on its own.
pub fn extract_text(path: &Path, timeout: Duration) -> Result<String> {
    let label = file_label(path);
    let unsupported = |reason: String| LedgerError::UnsupportedFormat {
        file: label.clone(),
        reason,
    };
    let kind = DocumentKind::detect(path)
        .ok_or_else(|| unsupported("expected a .pdf or .txt file".to_string()))?;
    let data = std::fs::read(path)?;

    match kind {
        DocumentKind::Text => String::from_utf8(data).map_err(|_| unsupported("text is not valid UTF-8".to_string())),
        DocumentKind::Pdf => {
            let (tx, rx) = mpsc::channel();
            thread::Builder::new()
                .name(format!("extract-{label}"))
                .spawn(move || {
                    let _ = tx.send(pdf_text(&data));
                })?;
            match rx.recv_timeout(timeout) {
                Ok(Ok(text)) if text.trim().is_empty() => Err(unsupported("no extractable text (scanned image?)".to_string())),
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(unsupported(format!("could not read PDF: {e}"))),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    tracing::warn!(file = %label, timeout_secs = timeout.as_secs(), "extraction timed out");
                    Err(unsupported(format!("extraction timed out after {}s", timeout.as_secs())))
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(unsupported("PDF decoder crashed".to_string())),
            }
        }
    }
}
