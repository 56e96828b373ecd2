//! `.tgitconfig` to directory property translation.
//!
//! TortoiseGit stores issue-tracker configuration in a `.tgitconfig` file;
//! keys of its `[bugtraq]` section map to the `bugtraq:*` directory
//! properties TortoiseSVN reads.

use super::Prop;

/// Parse `.tgitconfig` content into a literal-properties fragment.
pub(super) fn parse(content: &[u8]) -> Option<Prop> {
    let text = String::from_utf8_lossy(content);
    let mut props = Vec::new();
    let mut section = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = header.trim().to_lowercase();
            continue;
        }
        if section != "bugtraq" {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            props.push((
                format!("bugtraq:{}", key.trim().to_lowercase()),
                value.trim().to_string(),
            ));
        }
    }
    if props.is_empty() {
        None
    } else {
        Some(Prop::Entries { props })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bugtraq_keys_become_properties() {
        let content = b"[bugtraq]\n\turl = https://bugs.example.com/%BUGID%\n\tlogregex = #(\\d+)\n";
        let prop = parse(content).expect("fragment");
        match prop {
            Prop::Entries { props } => {
                assert_eq!(
                    props,
                    vec![
                        (
                            "bugtraq:url".to_string(),
                            "https://bugs.example.com/%BUGID%".to_string()
                        ),
                        ("bugtraq:logregex".to_string(), "#(\\d+)".to_string()),
                    ]
                );
            }
            other => panic!("unexpected fragment: {:?}", other),
        }
    }

    #[test]
    fn other_sections_are_ignored() {
        assert_eq!(parse(b"[core]\n\tautocrlf = true\n"), None);
    }
}
