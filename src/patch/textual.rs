//! Textual locator: regex match-and-substitute directly on the payload.
//!
//! This is the formatting-preserving strategy: only matched spans change,
//! every other byte is untouched. It exists because the host applications
//! re-open these files and are sensitive to whitespace a tree serializer
//! would rewrite.

use crate::edit::SpanEdit;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextualError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Compile one span edit per regex match; `template` may reference capture
/// groups as `$1`, `${name}`.
pub fn substitution_edits(
    text: &str,
    pattern: &str,
    template: &str,
) -> Result<Vec<SpanEdit>, TextualError> {
    let re = Regex::new(pattern)?;
    let mut edits = Vec::new();
    for caps in re.captures_iter(text) {
        let matched = caps.get(0).expect("capture group 0 always exists");
        let mut expanded = String::new();
        caps.expand(template, &mut expanded);
        edits.push(SpanEdit::new(matched.range(), expanded, matched.as_str()));
    }
    Ok(edits)
}

/// One edit per `name="..."` occurrence, rewriting only the quoted value.
///
/// The value is inserted literally; `$` has no special meaning here.
pub fn attribute_edits(text: &str, name: &str, value: &str) -> Vec<SpanEdit> {
    let re = attribute_regex(name);
    let mut edits = Vec::new();
    for caps in re.captures_iter(text) {
        let current = caps.get(1).expect("pattern has exactly one group");
        edits.push(SpanEdit::new(
            current.range(),
            value.to_string(),
            current.as_str(),
        ));
    }
    edits
}

/// Whether a guard pattern already matches the payload.
pub fn guard_matches(text: &str, pattern: &str) -> Result<bool, TextualError> {
    Ok(Regex::new(pattern)?.is_match(text))
}

fn attribute_regex(name: &str) -> Regex {
    let pattern = format!(r#"{}="([^"]*)""#, regex::escape(name));
    Regex::new(&pattern).expect("escaped attribute always yields a valid pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{SpanEdit, SpanOutcome};

    #[test]
    fn test_substitution_replaces_all_matches_only() {
        let text = r#"<A MacroControlIndex Value="-1" /><B MacroControlIndex Value="-1" />"#;
        let edits = substitution_edits(
            text,
            r#"MacroControlIndex Value="-1""#,
            r#"MacroControlIndex Value="3""#,
        )
        .unwrap();
        assert_eq!(edits.len(), 2);

        let (modified, _) = SpanEdit::apply_all(text, edits).unwrap();
        assert_eq!(
            modified,
            r#"<A MacroControlIndex Value="3" /><B MacroControlIndex Value="3" />"#
        );
    }

    #[test]
    fn test_substitution_capture_references() {
        let text = r#"<VOICE id="1"><VOICE id="2">"#;
        let edits =
            substitution_edits(text, r#"<VOICE ([^>]*)>"#, r#"<VOICE $1 linkvsDevice="16">"#)
                .unwrap();
        let (modified, _) = SpanEdit::apply_all(text, edits).unwrap();
        assert_eq!(
            modified,
            r#"<VOICE id="1" linkvsDevice="16"><VOICE id="2" linkvsDevice="16">"#
        );
    }

    #[test]
    fn test_attribute_edits_rewrite_value_span_only() {
        let text = r#"<LAYER pbup="3f75c28f" pbdn="3f75c28f" cutoff="0" />"#;
        let edits = attribute_edits(text, "pbup", "0");
        assert_eq!(edits.len(), 1);
        let (modified, outcomes) = SpanEdit::apply_all(text, edits).unwrap();
        assert_eq!(
            modified,
            r#"<LAYER pbup="0" pbdn="3f75c28f" cutoff="0" />"#
        );
        assert_eq!(outcomes, vec![SpanOutcome::Applied]);
    }

    #[test]
    fn test_attribute_edits_idempotent() {
        let text = r#"<LAYER pbup="0" />"#;
        let edits = attribute_edits(text, "pbup", "0");
        let (modified, outcomes) = SpanEdit::apply_all(text, edits).unwrap();
        assert_eq!(modified, text);
        assert_eq!(outcomes, vec![SpanOutcome::AlreadyApplied]);
    }

    #[test]
    fn test_attribute_name_escaped() {
        // dots in attribute names are literal, not regex wildcards
        let text = r#"<C CustomFloatTargets.0 Value="0" CustomFloatTargetsX0 Value="0" />"#;
        let edits = attribute_edits(text, "CustomFloatTargets.0 Value", "74");
        assert_eq!(edits.len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            substitution_edits("x", "(unclosed", "y"),
            Err(TextualError::Pattern(_))
        ));
    }

    #[test]
    fn test_guard() {
        assert!(guard_matches("<X MidiLearnDevice0=\"16\" />", "MidiLearnDevice").unwrap());
        assert!(!guard_matches("<X />", "MidiLearnDevice").unwrap());
    }
}
