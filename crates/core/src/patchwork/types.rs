//! Types for Patchwork API responses.

use serde::{Deserialize, Serialize};

/// A patch series as returned by `/api/series`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Series {
    /// Series id, increasing within a Patchwork instance.
    pub id: u64,
    /// Series name (Patchwork leaves it null when there is no cover letter
    /// and it could not be derived).
    #[serde(default)]
    pub name: Option<String>,
    /// Whether every patch of the series has been received.
    #[serde(default)]
    pub received_all: bool,
    /// Canonical API URL of the series.
    #[serde(default)]
    pub url: String,
    /// Patches in arrival order.
    #[serde(default)]
    pub patches: Vec<Patch>,
}

impl Series {
    /// Name used in build labels, falling back to the first patch subject.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self
                .patches
                .first()
                .map(|p| p.name.as_str())
                .unwrap_or("(untitled series)"),
        }
    }
}

/// A patch reference embedded in a series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patch {
    /// Patch id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Subject line, usually carrying a `[PATCH i/n]` marker.
    pub name: String,
    /// URL of the patch mbox.
    #[serde(default)]
    pub mbox: String,
}
