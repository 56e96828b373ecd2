//! core::props
//!
//! The SVN property model: layered fragments derived from in-tree
//! configuration files.
//!
//! # Architecture
//!
//! Each registered configuration file (`.gitignore`, `.gitattributes`,
//! `.tgitconfig`) is parsed once per blob into a [`Prop`] fragment. A
//! node's effective property set is the fold of its root-to-leaf fragment
//! list over an empty map: walking from the repository root, every
//! directory contributes the fragments of its own config files, and each
//! fragment decides via [`Prop::for_child`] how (and whether) it applies
//! one level further down.
//!
//! This keeps derived properties such as `svn:ignore` consistent with what
//! Git itself would enforce, which the commit builder later verifies
//! against client-supplied properties.
//!
//! The general-purpose wildcard engine is an external collaborator; the
//! parsers here only perform the basename-level matching they need.

mod attrs;
mod ignore;
mod tgitconfig;

use crate::core::types::{NodeKind, PropMap, PROP_IGNORE};

/// Configuration file basenames that contribute property fragments,
/// in lexicographic order.
pub const CONFIG_FILES: [&str; 3] = [".gitattributes", ".gitignore", ".tgitconfig"];

/// Whether a file name is a registered property-bearing config file.
pub fn is_config_file(name: &str) -> bool {
    CONFIG_FILES.contains(&name)
}

/// Parse a registered config file into a property fragment.
///
/// Returns `None` for unregistered names and for files that contribute
/// nothing (empty, comments only). Parsing is lenient: malformed lines are
/// skipped, never an error.
pub fn parse_config(name: &str, content: &[u8]) -> Option<Prop> {
    match name {
        ".gitignore" => ignore::parse(content),
        ".gitattributes" => attrs::parse(content),
        ".tgitconfig" => tgitconfig::parse(content),
        _ => None,
    }
}

/// A single auto-prop rule from `.gitattributes`: a basename pattern and
/// the properties it assigns to matching files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRule {
    /// Basename pattern; `*` is the only wildcard.
    pub pattern: String,
    /// Properties assigned to matching files, in rule order.
    pub props: Vec<(String, String)>,
}

/// A property fragment contributed by one configuration file.
///
/// Fragments compose by concatenation down the path; [`Prop::apply`] folds
/// a fragment into a node's property map and [`Prop::for_child`] derives
/// the fragment visible to a named child, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prop {
    /// `svn:ignore` lines from a `.gitignore`. `local` lines apply to the
    /// containing directory only; `global` lines also propagate to every
    /// descendant directory.
    Ignore {
        /// Anchored patterns, scoped to the containing directory.
        local: Vec<String>,
        /// Unanchored patterns, inherited by descendant directories.
        global: Vec<String>,
    },
    /// Auto-prop rules from a `.gitattributes`, resolved per child file.
    AutoProps {
        /// Rules in file order; later matches win.
        rules: Vec<AttrRule>,
    },
    /// Literal properties applied to the node the fragment is attached to.
    Entries {
        /// Properties in application order.
        props: Vec<(String, String)>,
    },
}

impl Prop {
    /// Fold this fragment into a node's property map.
    pub fn apply(&self, kind: NodeKind, props: &mut PropMap) {
        match self {
            Prop::Ignore { local, global } => {
                if kind != NodeKind::Dir {
                    return;
                }
                if local.is_empty() && global.is_empty() {
                    return;
                }
                let value = props.entry(PROP_IGNORE.to_string()).or_default();
                for line in local.iter().chain(global.iter()) {
                    value.push_str(line);
                    value.push('\n');
                }
            }
            Prop::AutoProps { .. } => {}
            Prop::Entries { props: entries } => {
                for (name, value) in entries {
                    props.insert(name.clone(), value.clone());
                }
            }
        }
    }

    /// The fragment a named child inherits from this one, if any.
    pub fn for_child(&self, name: &str, kind: NodeKind) -> Option<Prop> {
        match self {
            Prop::Ignore { global, .. } => match kind {
                NodeKind::Dir if !global.is_empty() => Some(Prop::Ignore {
                    local: Vec::new(),
                    global: global.clone(),
                }),
                _ => None,
            },
            Prop::AutoProps { rules } => match kind {
                NodeKind::Dir => Some(self.clone()),
                NodeKind::File | NodeKind::Symlink => {
                    let mut props = Vec::new();
                    for rule in rules {
                        if name_matches(&rule.pattern, name) {
                            props.extend(rule.props.iter().cloned());
                        }
                    }
                    if props.is_empty() {
                        None
                    } else {
                        Some(Prop::Entries { props })
                    }
                }
            },
            Prop::Entries { .. } => None,
        }
    }
}

/// Compose the effective fragment list for a node from its parent's list
/// and the fragments of its own configuration files.
pub fn join(parent: &[Prop], name: &str, kind: NodeKind, own: Vec<Prop>) -> Vec<Prop> {
    let mut out = Vec::with_capacity(parent.len() + own.len());
    for prop in parent {
        if let Some(child) = prop.for_child(name, kind) {
            out.push(child);
        }
    }
    out.extend(own);
    out
}

/// Match a basename against a single-`*` pattern.
///
/// Patterns with more than one wildcard or with path separators are the
/// external wildcard engine's business and never match here.
fn name_matches(pattern: &str, name: &str) -> bool {
    if pattern.contains('/') {
        return false;
    }
    match pattern.find('*') {
        None => pattern == name,
        Some(idx) => {
            let prefix = &pattern[..idx];
            let suffix = &pattern[idx + 1..];
            if suffix.contains('*') {
                return false;
            }
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PROP_EOL_STYLE, PROP_MIME_TYPE};

    #[test]
    fn registry_recognizes_config_files() {
        assert!(is_config_file(".gitignore"));
        assert!(is_config_file(".gitattributes"));
        assert!(is_config_file(".tgitconfig"));
        assert!(!is_config_file("README.md"));
    }

    #[test]
    fn unregistered_name_parses_to_nothing() {
        assert_eq!(parse_config("README.md", b"*.log"), None);
    }

    #[test]
    fn ignore_applies_to_own_directory() {
        let prop = parse_config(".gitignore", b"*.log\n/build\n").expect("fragment");
        let mut map = PropMap::new();
        prop.apply(NodeKind::Dir, &mut map);
        assert_eq!(map.get(PROP_IGNORE).map(String::as_str), Some("build\n*.log\n"));
    }

    #[test]
    fn ignore_propagates_only_global_lines() {
        let prop = parse_config(".gitignore", b"*.log\n/build\n").expect("fragment");
        let child = prop.for_child("sub", NodeKind::Dir).expect("inherited");
        let mut map = PropMap::new();
        child.apply(NodeKind::Dir, &mut map);
        assert_eq!(map.get(PROP_IGNORE).map(String::as_str), Some("*.log\n"));
    }

    #[test]
    fn ignore_does_not_reach_files() {
        let prop = parse_config(".gitignore", b"*.log\n").expect("fragment");
        assert_eq!(prop.for_child("a.txt", NodeKind::File), None);
    }

    #[test]
    fn anchored_only_ignore_stops_at_own_directory() {
        let prop = parse_config(".gitignore", b"/build\n").expect("fragment");
        assert_eq!(prop.for_child("sub", NodeKind::Dir), None);
    }

    #[test]
    fn auto_props_resolve_for_matching_files() {
        let prop = parse_config(".gitattributes", b"*.txt text\n*.bin binary\n").expect("fragment");
        let resolved = prop.for_child("notes.txt", NodeKind::File).expect("match");
        let mut map = PropMap::new();
        resolved.apply(NodeKind::File, &mut map);
        assert_eq!(map.get(PROP_EOL_STYLE).map(String::as_str), Some("native"));
        assert!(!map.contains_key(PROP_MIME_TYPE));
    }

    #[test]
    fn auto_props_pass_through_directories() {
        let prop = parse_config(".gitattributes", b"*.txt text\n").expect("fragment");
        assert_eq!(prop.for_child("sub", NodeKind::Dir), Some(prop));
    }

    #[test]
    fn later_attribute_wins() {
        let prop =
            parse_config(".gitattributes", b"* text\n*.dat binary\n").expect("fragment");
        let resolved = prop.for_child("blob.dat", NodeKind::File).expect("match");
        let mut map = PropMap::new();
        resolved.apply(NodeKind::File, &mut map);
        assert_eq!(
            map.get(PROP_MIME_TYPE).map(String::as_str),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn ignores_stack_root_to_leaf() {
        let root = parse_config(".gitignore", b"*.tmp\n").expect("fragment");
        let own = parse_config(".gitignore", b"*.log\n").expect("fragment");
        let effective = join(&[root], "sub", NodeKind::Dir, vec![own]);
        let mut map = PropMap::new();
        for prop in &effective {
            prop.apply(NodeKind::Dir, &mut map);
        }
        assert_eq!(map.get(PROP_IGNORE).map(String::as_str), Some("*.tmp\n*.log\n"));
    }

    #[test]
    fn name_matching() {
        assert!(name_matches("*", "anything"));
        assert!(name_matches("*.txt", "a.txt"));
        assert!(!name_matches("*.txt", "a.txt.bak"));
        assert!(name_matches("Makefile", "Makefile"));
        assert!(name_matches("a*c", "abc"));
        assert!(!name_matches("a*c", "ab"));
        assert!(!name_matches("a/*.txt", "a.txt"));
        assert!(!name_matches("**.txt", "a.txt"));
    }
}
