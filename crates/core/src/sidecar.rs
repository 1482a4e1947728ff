//! Sidecar metadata parsing and rendering.
//!
//! Each content folder may carry a small text file (`MANIFEST.txt`) whose front-matter block
//! holds the user-editable title, description and tags:
//!
//! ```text
//! ---
//! title: "Schön Magazine"
//! description: "Editorial, spring issue"
//! tags: ["editorial", "print"]
//! ---
//! ```
//!
//! Parsing is forgiving: it never fails, it accepts `subtitle:` as an alias for
//! `description:`, it falls back to a comma-split when `tags` is not valid JSON, and when no
//! front-matter exists it takes the first `# Heading` as title and the first substantial
//! prose line as description. Rendering always produces a well-formed block that parses back
//! to the same value.

use serde::{Deserialize, Serialize};

const FRONT_MATTER_DELIMITER: &str = "---";

/// Prose lines must be longer than this to count as a fallback description.
const MIN_FALLBACK_DESCRIPTION_CHARS: usize = 10;

/// User-editable metadata of one content folder.
///
/// All fields are optional; an entirely empty value is the "absent" state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl SidecarMetadata {
    /// True when no field carries any content.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.as_ref().map_or(true, |t| t.is_empty())
    }
}

/// Parses sidecar text into metadata. Never fails; unusable input yields the empty value.
pub fn parse_sidecar(content: &str) -> SidecarMetadata {
    let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();

    match front_matter_block(&lines) {
        Some(block) => parse_front_matter(block),
        None => parse_fallback(&lines),
    }
}

/// Renders metadata as a front-matter block. Empty fields are omitted.
pub fn format_sidecar(meta: &SidecarMetadata) -> String {
    let mut output = String::new();
    output.push_str(FRONT_MATTER_DELIMITER);
    output.push('\n');

    if let Some(title) = meta.title.as_deref().filter(|t| !t.is_empty()) {
        output.push_str(&format!("title: \"{}\"\n", escape_value(title)));
    }

    if let Some(description) = meta.description.as_deref().filter(|d| !d.is_empty()) {
        output.push_str(&format!("description: \"{}\"\n", escape_value(description)));
    }

    if let Some(tags) = meta.tags.as_ref().filter(|t| !t.is_empty()) {
        // A Vec<String> always serialises; the fallback only guards the type signature.
        let json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".into());
        output.push_str(&format!("tags: {}\n", json));
    }

    output.push_str(FRONT_MATTER_DELIMITER);
    output.push('\n');
    output
}

/// Returns the lines between the opening and closing delimiters.
///
/// The opening delimiter must be the first non-blank line.
fn front_matter_block<'a>(lines: &'a [&'a str]) -> Option<&'a [&'a str]> {
    let start = lines.iter().position(|l| !l.trim().is_empty())?;
    if lines[start].trim() != FRONT_MATTER_DELIMITER {
        return None;
    }

    let body_start = start + 1;
    let close = lines[body_start..]
        .iter()
        .position(|l| l.trim() == FRONT_MATTER_DELIMITER)?;

    Some(&lines[body_start..body_start + close])
}

fn parse_front_matter(block: &[&str]) -> SidecarMetadata {
    let mut meta = SidecarMetadata::default();
    let mut subtitle = None;

    for line in block {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "title" => meta.title = non_empty(unquote(value)),
            "description" => meta.description = non_empty(unquote(value)),
            "subtitle" => subtitle = non_empty(unquote(value)),
            "tags" => {
                let tags = parse_tags(value);
                meta.tags = if tags.is_empty() { None } else { Some(tags) };
            }
            _ => {}
        }
    }

    // An explicit description wins over the alias regardless of order.
    if meta.description.is_none() {
        meta.description = subtitle;
    }

    meta
}

fn parse_fallback(lines: &[&str]) -> SidecarMetadata {
    let mut meta = SidecarMetadata::default();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('#') {
            if meta.title.is_none() && trimmed.starts_with("# ") {
                meta.title = non_empty(trimmed.trim_start_matches('#').trim().to_string());
            }
            continue;
        }

        if meta.description.is_none()
            && trimmed.chars().count() > MIN_FALLBACK_DESCRIPTION_CHARS
            && trimmed != FRONT_MATTER_DELIMITER
        {
            meta.description = Some(trimmed.to_string());
        }
    }

    meta
}

/// Tags are a JSON array; hand-edited files sometimes are not, so fall back to splitting.
///
/// JSON tags are taken verbatim. Only the comma-split fallback trims.
fn parse_tags(value: &str) -> Vec<String> {
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(value) {
        return tags;
    }

    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|t| {
            t.trim()
                .trim_matches('"')
                .trim_matches('\'')
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Strips surrounding quotes and reverses `escape_value`.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return unescape_value(&value[1..value.len() - 1]);
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str(r"\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str(r"\n"),
            '\r' => escaped.push_str(r"\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

/// Unquoted values arrive trimmed; quoted ones keep their inner whitespace.
fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: Option<&str>, description: Option<&str>, tags: &[&str]) -> SidecarMetadata {
        SidecarMetadata {
            title: title.map(str::to_string),
            description: description.map(str::to_string),
            tags: if tags.is_empty() {
                None
            } else {
                Some(tags.iter().map(|t| t.to_string()).collect())
            },
        }
    }

    #[test]
    fn test_parse_front_matter() {
        let content = "---\ntitle: \"Schön Magazine\"\ndescription: \"Editorial\"\ntags: [\"print\", \"editorial\"]\n---\n";
        let parsed = parse_sidecar(content);
        assert_eq!(
            parsed,
            meta(Some("Schön Magazine"), Some("Editorial"), &["print", "editorial"])
        );
    }

    #[test]
    fn test_parse_subtitle_alias() {
        let parsed = parse_sidecar("---\ntitle: A\nsubtitle: \"Backstage\"\n---");
        assert_eq!(parsed.title.as_deref(), Some("A"));
        assert_eq!(parsed.description.as_deref(), Some("Backstage"));
    }

    #[test]
    fn test_description_wins_over_subtitle() {
        let parsed = parse_sidecar("---\ndescription: \"Real\"\nsubtitle: \"Alias\"\n---");
        assert_eq!(parsed.description.as_deref(), Some("Real"));

        let parsed = parse_sidecar("---\nsubtitle: \"Alias\"\ndescription: \"Real\"\n---");
        assert_eq!(parsed.description.as_deref(), Some("Real"));
    }

    #[test]
    fn test_parse_tags_fallback_split() {
        let parsed = parse_sidecar("---\ntags: [bridal, 'editorial', \"film\"\n---");
        assert_eq!(
            parsed.tags,
            Some(vec!["bridal".into(), "editorial".into(), "film".into()])
        );

        let parsed = parse_sidecar("---\ntags: bridal, film\n---");
        assert_eq!(parsed.tags, Some(vec!["bridal".into(), "film".into()]));
    }

    #[test]
    fn test_parse_empty_tags_is_absent() {
        let parsed = parse_sidecar("---\ntitle: \"A\"\ntags: []\n---");
        assert_eq!(parsed.tags, None);
    }

    #[test]
    fn test_parse_fallback_heading_and_prose() {
        let content = "# Bridal Look\n\nshort\nSoft glam for a summer wedding.\nAnother line here.";
        let parsed = parse_sidecar(content);
        assert_eq!(parsed.title.as_deref(), Some("Bridal Look"));
        assert_eq!(
            parsed.description.as_deref(),
            Some("Soft glam for a summer wedding.")
        );
        assert_eq!(parsed.tags, None);
    }

    #[test]
    fn test_parse_unclosed_front_matter_falls_back() {
        let parsed = parse_sidecar("---\ntitle: \"Never closed\"\n");
        // No closing delimiter: treated as prose, "title: ..." is long enough to be a description.
        assert_eq!(parsed.title, None);
        assert_eq!(
            parsed.description.as_deref(),
            Some("title: \"Never closed\"")
        );
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_sidecar("").is_empty());
        assert!(parse_sidecar("\n\n   \n").is_empty());
        assert!(parse_sidecar("---\n---\n").is_empty());
        assert!(parse_sidecar("---\n: : :\nnonsense\n---").is_empty());
    }

    #[test]
    fn test_parse_crlf_and_bom() {
        let parsed = parse_sidecar("\u{feff}---\r\ntitle: \"Windows\"\r\n---\r\n");
        assert_eq!(parsed.title.as_deref(), Some("Windows"));
    }

    #[test]
    fn test_format_omits_empty_fields() {
        let rendered = format_sidecar(&meta(Some("Only title"), None, &[]));
        assert_eq!(rendered, "---\ntitle: \"Only title\"\n---\n");

        let rendered = format_sidecar(&SidecarMetadata {
            title: Some(String::new()),
            description: None,
            tags: Some(vec![]),
        });
        assert_eq!(rendered, "---\n---\n");
    }

    #[test]
    fn test_format_escapes_quotes() {
        let rendered = format_sidecar(&meta(Some("The \"Red\" Look"), None, &[]));
        assert!(rendered.contains(r#"title: "The \"Red\" Look""#));
    }

    #[test]
    fn test_format_then_parse_reproduces_value() {
        let cases = vec![
            meta(Some("Schön Magazine"), None, &[]),
            meta(Some("A"), Some("B"), &["x", "y"]),
            meta(None, Some("Only a description"), &[]),
            meta(None, None, &["solo"]),
            meta(Some(r#"Back\slash "and" quotes"#), Some("two\nlines"), &["a, b", "c\"d"]),
            meta(Some("title: with colon"), Some("--- dashes ---"), &[]),
        ];

        for case in cases {
            let rendered = format_sidecar(&case);
            assert_eq!(parse_sidecar(&rendered), case, "failed for {rendered}");
        }
    }

    #[test]
    fn test_round_trip_over_generated_values() {
        let fragments = [
            " ",
            "a",
            " padded ",
            "x\r\ny",
            "\r",
            "\n",
            "tab\there",
            "say \"hi\"",
            r"back\slash",
            r"\n literal",
            r"\r literal",
            "Schön",
            "---",
            "title: x",
            "'single'",
            "[a, b]",
        ];

        let mut values: Vec<String> = fragments.iter().map(|f| f.to_string()).collect();
        for left in &fragments {
            for right in &fragments {
                values.push(format!("{left}{right}"));
            }
        }

        let mut checked = 0;
        for (i, title) in values.iter().enumerate() {
            let description = &values[(i * 7 + 3) % values.len()];
            let tag_count = i % 4;
            let tags: Vec<String> = (0..tag_count)
                .map(|n| values[(i * 13 + n * 5) % values.len()].clone())
                .collect();

            let variants = [
                SidecarMetadata {
                    title: Some(title.clone()),
                    description: Some(description.clone()),
                    tags: Some(tags.clone()).filter(|t| !t.is_empty()),
                },
                SidecarMetadata {
                    title: None,
                    description: Some(title.clone()),
                    tags: None,
                },
                SidecarMetadata {
                    title: Some(title.clone()),
                    description: None,
                    tags: Some(vec![title.clone(), String::new()]),
                },
            ];

            for case in variants {
                let rendered = format_sidecar(&case);
                assert_eq!(parse_sidecar(&rendered), case, "failed for {rendered:?}");
                checked += 1;
            }
        }
        assert!(checked > 800);
    }

    #[test]
    fn test_whitespace_values_survive_round_trip() {
        let case = meta(Some(" "), Some("x\r\ny"), &[" a ", "b"]);
        let rendered = format_sidecar(&case);
        assert_eq!(rendered, "---\ntitle: \" \"\ndescription: \"x\\r\\ny\"\ntags: [\" a \",\"b\"]\n---\n");
        assert_eq!(parse_sidecar(&rendered), case);
    }

    #[test]
    fn test_hand_written_quoted_blank_is_kept_unquoted_blank_is_not() {
        let parsed = parse_sidecar("---\ntitle:    \ndescription: \"  \"\n---");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.description.as_deref(), Some("  "));
    }
}
