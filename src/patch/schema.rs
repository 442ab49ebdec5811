use serde::Deserialize;
use std::fmt;

use crate::value::ParamValue;

/// A TOML patch set: metadata plus a list of declarative operations.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchSet {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One declarative edit intent: locate zero or more targets, mutate them.
#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub locator: Locator,
    pub mutation: Mutation,
}

/// How the target of a mutation is found in the decoded payload.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Locator {
    /// Structural: navigate the XML tree by element names. The path matches
    /// any element whose ancestry ends with the given slash-separated
    /// segments (`GroupDevicePreset/Device/Tempo`).
    ElementPath {
        path: String,
        /// 1-based instance selector; all matches when absent
        #[serde(default)]
        occurrence: Option<usize>,
    },
    /// Textual: regular expression over the raw payload, preserving every
    /// byte outside the matched spans.
    Regex {
        pattern: String,
        /// Exact number of matches required; all matches edited when absent
        #[serde(default)]
        expected_count: Option<usize>,
    },
    /// Textual shorthand for the `name="..."` attribute idiom.
    Attribute {
        name: String,
        #[serde(default)]
        expected_count: Option<usize>,
    },
}

/// What is done at each located target.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Mutation {
    /// Rewrite an attribute value. With an element-path locator, `attribute`
    /// names the attribute on the located element; with an attribute
    /// locator the name comes from the locator itself.
    SetValue {
        #[serde(default)]
        attribute: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        float: Option<f32>,
    },
    /// Insert sibling XML text immediately after the located element.
    InsertAfter { text: String },
    /// Insert sibling XML text immediately before the located element.
    InsertBefore { text: String },
    /// Delete the located element, start tag through end tag.
    Remove,
    /// Regex substitution; `$n` refers to locator capture groups. When
    /// `guard` already matches the payload the operation reports
    /// already-applied without editing.
    Replace {
        replacement: String,
        #[serde(default)]
        guard: Option<String>,
    },
}

impl Mutation {
    /// Resolve the configured value for a set-value mutation.
    ///
    /// Validation guarantees exactly one of `text`/`float` is present.
    pub fn param_value(&self) -> Option<ParamValue> {
        match self {
            Mutation::SetValue {
                text: Some(text), ..
            } => Some(ParamValue::Text(text.clone())),
            Mutation::SetValue {
                float: Some(value), ..
            } => Some(ParamValue::Float(*value)),
            _ => None,
        }
    }
}

impl PatchSet {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        for patch in &self.patches {
            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            }

            match &patch.locator {
                Locator::ElementPath { path, occurrence } => {
                    if path.trim().is_empty() || path.split('/').any(|seg| seg.trim().is_empty()) {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "locator.path",
                        });
                    }
                    if *occurrence == Some(0) {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "occurrence is 1-based; 0 is not a valid instance".to_string(),
                        });
                    }
                }
                Locator::Regex { pattern, .. } => {
                    if pattern.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "locator.pattern",
                        });
                    }
                }
                Locator::Attribute { name, .. } => {
                    if name.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "locator.name",
                        });
                    }
                }
            }

            match &patch.mutation {
                Mutation::SetValue {
                    attribute,
                    text,
                    float,
                } => {
                    match (text, float) {
                        (None, None) => issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "mutation.text or mutation.float",
                        }),
                        (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "set-value takes text or float, not both".to_string(),
                        }),
                        _ => {}
                    }
                    match &patch.locator {
                        Locator::ElementPath { .. } => {
                            if attribute.as_deref().unwrap_or("").trim().is_empty() {
                                issues.push(ValidationIssue::MissingField {
                                    patch_id: Some(patch.id.clone()),
                                    field: "mutation.attribute",
                                });
                            }
                        }
                        Locator::Attribute { .. } => {
                            if attribute.is_some() {
                                issues.push(ValidationIssue::InvalidCombo {
                                    patch_id: Some(patch.id.clone()),
                                    message:
                                        "attribute locator already names the attribute to set"
                                            .to_string(),
                                });
                            }
                        }
                        Locator::Regex { .. } => issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "set-value with a regex locator is ambiguous; use replace"
                                .to_string(),
                        }),
                    }
                }
                Mutation::InsertAfter { text } | Mutation::InsertBefore { text } => {
                    if text.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "mutation.text",
                        });
                    }
                    if !matches!(patch.locator, Locator::ElementPath { .. }) {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "sibling insertion requires an element-path locator"
                                .to_string(),
                        });
                    }
                }
                Mutation::Remove => {
                    if !matches!(patch.locator, Locator::ElementPath { .. }) {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "remove requires an element-path locator".to_string(),
                        });
                    }
                }
                Mutation::Replace { .. } => {
                    if !matches!(patch.locator, Locator::Regex { .. }) {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "replace requires a regex locator".to_string(),
                        });
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch set contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> PatchSet {
        toml_edit::de::from_str(toml).unwrap()
    }

    #[test]
    fn test_valid_attribute_patch() {
        let set = parse(
            r#"
[meta]
name = "pitchbend"

[[patches]]
id = "pbup"

[patches.locator]
type = "attribute"
name = "pbup"

[patches.mutation]
type = "set-value"
float = 0.24
"#,
        );
        assert!(set.validate().is_ok());
        assert_eq!(set.patches.len(), 1);
    }

    #[test]
    fn test_empty_patch_list_rejected() {
        let set = parse("[meta]\nname = \"empty\"\n");
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_set_value_requires_exactly_one_value_form() {
        let set = parse(
            r#"
[[patches]]
id = "both"

[patches.locator]
type = "attribute"
name = "pbup"

[patches.mutation]
type = "set-value"
text = "0"
float = 0.24
"#,
        );
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_replace_requires_regex_locator() {
        let set = parse(
            r#"
[[patches]]
id = "bad-combo"

[patches.locator]
type = "element-path"
path = "Ableton/Tempo"

[patches.mutation]
type = "replace"
replacement = "x"
"#,
        );
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_element_path_set_value_needs_attribute() {
        let set = parse(
            r#"
[[patches]]
id = "tempo"

[patches.locator]
type = "element-path"
path = "Ableton/Tempo"

[patches.mutation]
type = "set-value"
text = "140"
"#,
        );
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_param_value_resolution() {
        let mutation = Mutation::SetValue {
            attribute: None,
            text: None,
            float: Some(0.0),
        };
        assert_eq!(mutation.param_value().unwrap().render(), "0");
    }
}
