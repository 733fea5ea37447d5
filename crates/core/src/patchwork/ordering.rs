//! Build ordering for the patches of a series.
//!
//! Patchwork lists patches in arrival order, which is not necessarily the
//! order they apply in. The order is recovered from the `i/n` marker in the
//! bracketed subject prefix (`[PATCH v3 2/7] ...`).

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::warn;

use super::Patch;

/// First bracketed group containing an `i/n` pair. Free text may surround
/// the numbers inside the brackets.
static ORDINAL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*?(\d+)/(\d+)[^\]]*\]").unwrap());

/// Extract the position `i` from a subject carrying an `[... i/n ...]` marker.
pub fn extract_ordinal(subject: &str) -> Option<u32> {
    ORDINAL_MARKER
        .captures(subject)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Order a series' patches for a build.
///
/// A single patch is returned as is, marker or not. Otherwise patches are
/// stably sorted by their ordinal; patches without a marker keep their
/// relative arrival order and go after every marked patch. No patch is
/// dropped or merged.
pub fn sort_patches(patches: Vec<Patch>) -> Vec<Patch> {
    if patches.len() <= 1 {
        return patches;
    }

    let mut keyed: Vec<(u32, Patch)> = patches
        .into_iter()
        .map(|patch| {
            let key = match extract_ordinal(&patch.name) {
                Some(ordinal) => ordinal,
                None => {
                    warn!(
                        subject = %patch.name,
                        "Patch subject has no i/n marker, ordering it last"
                    );
                    u32::MAX
                }
            };
            (key, patch)
        })
        .collect();

    // sort_by_key is stable: equal ordinals keep arrival order
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, patch)| patch).collect()
}
