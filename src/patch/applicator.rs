//! Patch applicator: runs a patch set against decoded payload text.
//!
//! Missing targets are normal outcomes, not errors. A patch set applied to
//! a heterogeneous preset library will hit files where a parameter simply
//! does not exist, and files it already patched on a previous run; both are
//! reported per operation and never abort the file.

use crate::edit::{EditError, SpanEdit, SpanOutcome};
use crate::patch::schema::{Locator, Mutation, PatchDefinition};
use crate::patch::structural::{self, StructuralError};
use crate::patch::textual::{self, TextualError};
use std::fmt;
use thiserror::Error;

/// Outcome of one patch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "OperationOutcome should be checked and reported"]
pub enum OperationOutcome {
    /// At least one target was rewritten
    Applied { count: usize },
    /// Every target was already in the desired state
    AlreadyApplied,
    /// The locator matched nothing
    NotFound,
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationOutcome::Applied { count } => write!(f, "applied ({count} target(s))"),
            OperationOutcome::AlreadyApplied => write!(f, "already applied"),
            OperationOutcome::NotFound => write!(f, "target not found"),
        }
    }
}

/// Errors that abort processing of the whole payload.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Textual(#[from] TextualError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("patch '{id}' matched {found} target(s), expected {expected}")]
    CountMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("patch '{id}' has no value configured")]
    MissingValue { id: String },

    #[error("patch '{id}': locator and mutation combination is not supported")]
    UnsupportedCombination { id: String },
}

/// Apply every patch in order, each seeing the text produced by the
/// previous one. Returns the final text and a per-patch outcome list.
pub fn apply(
    text: &str,
    patches: &[PatchDefinition],
) -> Result<(String, Vec<(String, OperationOutcome)>), ApplyError> {
    let mut current = text.to_string();
    let mut outcomes = Vec::with_capacity(patches.len());

    for patch in patches {
        let (next, outcome) = apply_one(&current, patch)?;
        if let Some(next) = next {
            current = next;
        }
        outcomes.push((patch.id.clone(), outcome));
    }

    Ok((current, outcomes))
}

fn apply_one(
    text: &str,
    patch: &PatchDefinition,
) -> Result<(Option<String>, OperationOutcome), ApplyError> {
    match (&patch.locator, &patch.mutation) {
        (Locator::ElementPath { path, occurrence }, mutation) => {
            let mut spans = structural::locate(text, path)?;
            if let Some(n) = *occurrence {
                spans = match spans.into_iter().nth(n.saturating_sub(1)) {
                    Some(span) => vec![span],
                    None => return Ok((None, OperationOutcome::NotFound)),
                };
            }
            if spans.is_empty() {
                return Ok((None, OperationOutcome::NotFound));
            }

            let edits = match mutation {
                Mutation::SetValue { attribute, .. } => {
                    let value = patch
                        .mutation
                        .param_value()
                        .ok_or_else(|| ApplyError::MissingValue {
                            id: patch.id.clone(),
                        })?
                        .render();
                    let attribute = attribute.as_deref().unwrap_or("");
                    let edits: Vec<SpanEdit> = spans
                        .iter()
                        .filter_map(|span| {
                            structural::attribute_value_span(text, &span.start_tag, attribute)
                        })
                        .map(|range| {
                            let current = text[range.clone()].to_string();
                            SpanEdit::new(range, value.clone(), &current)
                        })
                        .collect();
                    if edits.is_empty() {
                        // elements exist but none carries the attribute
                        return Ok((None, OperationOutcome::NotFound));
                    }
                    edits
                }
                Mutation::InsertAfter { text: sibling } => {
                    if text.contains(sibling.as_str()) {
                        return Ok((None, OperationOutcome::AlreadyApplied));
                    }
                    spans
                        .iter()
                        .map(|span| SpanEdit::new(span.full.end..span.full.end, sibling.clone(), ""))
                        .collect()
                }
                Mutation::InsertBefore { text: sibling } => {
                    if text.contains(sibling.as_str()) {
                        return Ok((None, OperationOutcome::AlreadyApplied));
                    }
                    spans
                        .iter()
                        .map(|span| {
                            SpanEdit::new(span.full.start..span.full.start, sibling.clone(), "")
                        })
                        .collect()
                }
                Mutation::Remove => spans
                    .iter()
                    .map(|span| {
                        let current = &text[span.full.clone()];
                        SpanEdit::new(span.full.clone(), "", current)
                    })
                    .collect(),
                Mutation::Replace { .. } => {
                    return Err(ApplyError::UnsupportedCombination {
                        id: patch.id.clone(),
                    })
                }
            };

            finish(text, edits)
        }

        (
            Locator::Regex {
                pattern,
                expected_count,
            },
            Mutation::Replace { replacement, guard },
        ) => {
            if let Some(guard) = guard {
                if textual::guard_matches(text, guard)? {
                    return Ok((None, OperationOutcome::AlreadyApplied));
                }
            }

            let edits = textual::substitution_edits(text, pattern, replacement)?;
            check_count(patch, edits.len(), *expected_count)?;
            if edits.is_empty() {
                return Ok((None, OperationOutcome::NotFound));
            }
            finish(text, edits)
        }

        (
            Locator::Attribute {
                name,
                expected_count,
            },
            Mutation::SetValue { .. },
        ) => {
            let value = patch
                .mutation
                .param_value()
                .ok_or_else(|| ApplyError::MissingValue {
                    id: patch.id.clone(),
                })?
                .render();
            let edits = textual::attribute_edits(text, name, &value);
            check_count(patch, edits.len(), *expected_count)?;
            if edits.is_empty() {
                return Ok((None, OperationOutcome::NotFound));
            }
            finish(text, edits)
        }

        _ => Err(ApplyError::UnsupportedCombination {
            id: patch.id.clone(),
        }),
    }
}

fn check_count(
    patch: &PatchDefinition,
    found: usize,
    expected: Option<usize>,
) -> Result<(), ApplyError> {
    match expected {
        Some(expected) if expected != found => Err(ApplyError::CountMismatch {
            id: patch.id.clone(),
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

fn finish(
    text: &str,
    edits: Vec<SpanEdit>,
) -> Result<(Option<String>, OperationOutcome), ApplyError> {
    let (modified, span_outcomes) = SpanEdit::apply_all(text, edits)?;
    let count = span_outcomes
        .iter()
        .filter(|o| matches!(o, SpanOutcome::Applied))
        .count();
    if count == 0 {
        Ok((None, OperationOutcome::AlreadyApplied))
    } else {
        Ok((Some(modified), OperationOutcome::Applied { count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::loader::load_from_str;

    const RACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton>
	<GroupDevicePreset>
		<Tempo Value="120" />
		<MacroControls.0 Value="63.5" />
		<KeyMidi>
			<Channel Value="16" />
		</KeyMidi>
	</GroupDevicePreset>
</Ableton>
"#;

    fn patches(toml: &str) -> Vec<PatchDefinition> {
        load_from_str(toml).unwrap().patches
    }

    #[test]
    fn test_structural_set_attribute() {
        let defs = patches(
            r#"
[[patches]]
id = "tempo"

[patches.locator]
type = "element-path"
path = "GroupDevicePreset/Tempo"

[patches.mutation]
type = "set-value"
attribute = "Value"
text = "140"
"#,
        );

        let (modified, outcomes) = apply(RACK, &defs).unwrap();
        assert!(modified.contains(r#"<Tempo Value="140" />"#));
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 1 });

        // everything outside the value span is untouched
        assert_eq!(modified.replace("140", "120"), RACK);

        // second pass is a no-op
        let (again, outcomes) = apply(&modified, &defs).unwrap();
        assert_eq!(again, modified);
        assert_eq!(outcomes[0].1, OperationOutcome::AlreadyApplied);
    }

    #[test]
    fn test_structural_missing_element_is_not_found() {
        let defs = patches(
            r#"
[[patches]]
id = "ghost"

[patches.locator]
type = "element-path"
path = "NoSuchDevice"

[patches.mutation]
type = "set-value"
attribute = "Value"
text = "1"
"#,
        );
        let (modified, outcomes) = apply(RACK, &defs).unwrap();
        assert_eq!(modified, RACK);
        assert_eq!(outcomes[0].1, OperationOutcome::NotFound);
    }

    #[test]
    fn test_structural_missing_attribute_is_not_found() {
        let defs = patches(
            r#"
[[patches]]
id = "no-attr"

[patches.locator]
type = "element-path"
path = "GroupDevicePreset/Tempo"

[patches.mutation]
type = "set-value"
attribute = "Phase"
text = "1"
"#,
        );
        let (_, outcomes) = apply(RACK, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::NotFound);
    }

    #[test]
    fn test_insert_after_is_guarded() {
        let defs = patches(
            r#"
[[patches]]
id = "add-note-mapping"

[patches.locator]
type = "element-path"
path = "KeyMidi/Channel"

[patches.mutation]
type = "insert-after"
text = "\n\t\t\t<NoteOrController Value=\"74\" />"
"#,
        );

        let (modified, outcomes) = apply(RACK, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 1 });
        assert!(modified.contains(r#"<NoteOrController Value="74" />"#));

        let (again, outcomes) = apply(&modified, &defs).unwrap();
        assert_eq!(again, modified);
        assert_eq!(outcomes[0].1, OperationOutcome::AlreadyApplied);
    }

    #[test]
    fn test_insert_before_places_sibling_first() {
        let defs = patches(
            r#"
[[patches]]
id = "prepend-channel"

[patches.locator]
type = "element-path"
path = "KeyMidi/Channel"

[patches.mutation]
type = "insert-before"
text = "<IsNote Value=\"true\" />"
"#,
        );

        let (modified, outcomes) = apply(RACK, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 1 });
        assert!(modified.contains(r#"<IsNote Value="true" /><Channel Value="16" />"#));

        let (again, outcomes) = apply(&modified, &defs).unwrap();
        assert_eq!(again, modified);
        assert_eq!(outcomes[0].1, OperationOutcome::AlreadyApplied);
    }

    #[test]
    fn test_remove_element() {
        let defs = patches(
            r#"
[[patches]]
id = "strip-keymidi"

[patches.locator]
type = "element-path"
path = "KeyMidi"

[patches.mutation]
type = "remove"
"#,
        );

        let (modified, outcomes) = apply(RACK, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 1 });
        assert!(!modified.contains("KeyMidi"));

        // removing again: the element is gone
        let (_, outcomes) = apply(&modified, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::NotFound);
    }

    #[test]
    fn test_occurrence_selection() {
        let text = r#"<Root><Pad Note="36" /><Pad Note="38" /><Pad Note="42" /></Root>"#;
        let defs = patches(
            r#"
[[patches]]
id = "second-pad"

[patches.locator]
type = "element-path"
path = "Pad"
occurrence = 2

[patches.mutation]
type = "set-value"
attribute = "Note"
text = "40"
"#,
        );
        let (modified, outcomes) = apply(text, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 1 });
        assert_eq!(
            modified,
            r#"<Root><Pad Note="36" /><Pad Note="40" /><Pad Note="42" /></Root>"#
        );
    }

    #[test]
    fn test_textual_replace_all() {
        let text = r#"<A MacroControlIndex Value="-1" /><B MacroControlIndex Value="-1" />"#;
        let defs = patches(
            r#"
[[patches]]
id = "assign-macro"

[patches.locator]
type = "regex"
pattern = 'MacroControlIndex Value="-1"'

[patches.mutation]
type = "replace"
replacement = 'MacroControlIndex Value="3"'
"#,
        );
        let (modified, outcomes) = apply(text, &defs).unwrap();
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 2 });
        assert_eq!(
            modified,
            r#"<A MacroControlIndex Value="3" /><B MacroControlIndex Value="3" />"#
        );
    }

    #[test]
    fn test_textual_expected_count_mismatch() {
        let text = r#"<A MacroControlIndex Value="-1" />"#;
        let defs = patches(
            r#"
[[patches]]
id = "assign-macro"

[patches.locator]
type = "regex"
pattern = 'MacroControlIndex Value="-1"'
expected_count = 2

[patches.mutation]
type = "replace"
replacement = 'MacroControlIndex Value="3"'
"#,
        );
        assert!(matches!(
            apply(text, &defs),
            Err(ApplyError::CountMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_replace_guard_reports_already_applied() {
        let text = r#"<X attk="0" attkMidiLearnDevice0="16" />"#;
        let defs = patches(
            r#"
[[patches]]
id = "map-attack"

[patches.locator]
type = "regex"
pattern = 'attk="[^"]*"'

[patches.mutation]
type = "replace"
replacement = '$0 attkMidiLearnDevice0="16"'
guard = "attkMidiLearnDevice0"
"#,
        );
        let (modified, outcomes) = apply(text, &defs).unwrap();
        assert_eq!(modified, text);
        assert_eq!(outcomes[0].1, OperationOutcome::AlreadyApplied);
    }

    #[test]
    fn test_attribute_locator_float_value() {
        let text = r#"<LAYER pbup="3e75c28f" pbdn="3e75c28f" />"#;
        let defs = patches(
            r#"
[[patches]]
id = "pbup"

[patches.locator]
type = "attribute"
name = "pbup"

[patches.mutation]
type = "set-value"
float = 0.0

[[patches]]
id = "pbdn"

[patches.locator]
type = "attribute"
name = "pbdn"

[patches.mutation]
type = "set-value"
float = 1.0
"#,
        );
        let (modified, outcomes) = apply(text, &defs).unwrap();
        assert_eq!(modified, r#"<LAYER pbup="0" pbdn="3f800000" />"#);
        assert_eq!(outcomes[0].1, OperationOutcome::Applied { count: 1 });
        assert_eq!(outcomes[1].1, OperationOutcome::Applied { count: 1 });
    }

    #[test]
    fn test_malformed_xml_fails_only_structural() {
        let broken = "<Root><Unclosed>";
        let structural = patches(
            r#"
[[patches]]
id = "tempo"

[patches.locator]
type = "element-path"
path = "Tempo"

[patches.mutation]
type = "set-value"
attribute = "Value"
text = "1"
"#,
        );
        assert!(apply(broken, &structural).is_err());

        let textual = patches(
            r#"
[[patches]]
id = "rename"

[patches.locator]
type = "regex"
pattern = "Unclosed"

[patches.mutation]
type = "replace"
replacement = "Open"
"#,
        );
        assert!(apply(broken, &textual).is_ok());
    }
}
