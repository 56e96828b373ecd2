//! `.gitattributes` to SVN auto-prop translation.
//!
//! Supported attributes: `text` / `text=auto` map to `svn:eol-style`
//! `native`, `eol=lf` / `eol=crlf` pin the style, and `binary` / `-text`
//! mark content as `application/octet-stream`. Everything else is ignored.

use super::{AttrRule, Prop};
use crate::core::types::{PROP_EOL_STYLE, PROP_MIME_TYPE};

/// Parse `.gitattributes` content into an auto-props fragment.
pub(super) fn parse(content: &[u8]) -> Option<Prop> {
    let text = String::from_utf8_lossy(content);
    let mut rules = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let pattern = match parts.next() {
            Some(p) => p,
            None => continue,
        };
        let mut props: Vec<(String, String)> = Vec::new();
        for attr in parts {
            let mapped: Option<(&str, &str)> = match attr {
                "text" | "text=auto" => Some((PROP_EOL_STYLE, "native")),
                "eol=lf" => Some((PROP_EOL_STYLE, "LF")),
                "eol=crlf" => Some((PROP_EOL_STYLE, "CRLF")),
                "binary" | "-text" => Some((PROP_MIME_TYPE, "application/octet-stream")),
                _ => None,
            };
            if let Some((name, value)) = mapped {
                props.push((name.to_string(), value.to_string()));
            }
        }
        if !props.is_empty() {
            rules.push(AttrRule {
                pattern: pattern.to_string(),
                props,
            });
        }
    }
    if rules.is_empty() {
        None
    } else {
        Some(Prop::AutoProps { rules })
    }
}
