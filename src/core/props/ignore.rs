//! `.gitignore` to `svn:ignore` translation.
//!
//! Unanchored patterns (`*.log`) apply to the containing directory and to
//! every directory below it; anchored patterns (`/build`, `doc/cache`)
//! apply to the containing directory only. Negations and multi-wildcard
//! patterns are left to the external wildcard engine.

use super::Prop;

/// Parse `.gitignore` content into an ignore fragment.
pub(super) fn parse(content: &[u8]) -> Option<Prop> {
    let text = String::from_utf8_lossy(content);
    let mut local = Vec::new();
    let mut global = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let line = line.strip_suffix('/').unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        if let Some(anchored) = line.strip_prefix('/') {
            local.push(anchored.to_string());
        } else if line.contains('/') {
            local.push(line.to_string());
        } else {
            global.push(line.to_string());
        }
    }
    if local.is_empty() && global.is_empty() {
        None
    } else {
        Some(Prop::Ignore { local, global })
    }
}
