//! Structural locator: element-path navigation over the payload XML.
//!
//! Instead of round-tripping the document through a tree serializer (which
//! rewrites formatting the host applications are sensitive to), the reader
//! only acquires byte spans; mutations are applied through [`SpanEdit`] so
//! every byte outside the edited span survives untouched.
//!
//! [`SpanEdit`]: crate::edit::SpanEdit

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("payload is not parseable XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("payload XML ends with {0} unclosed element(s)")]
    Truncated(usize),
}

/// Byte spans of one located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpan {
    /// The start tag, `<` through `>`
    pub start_tag: Range<usize>,
    /// The whole element, start tag through matching end tag
    pub full: Range<usize>,
    pub self_closing: bool,
}

/// Find every element whose ancestry ends with the slash-separated `path`
/// segments, in document order.
pub fn locate(xml: &str, path: &str) -> Result<Vec<ElementSpan>, StructuralError> {
    let segments: Vec<&str> = path.split('/').collect();
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    // Matches still waiting for their end tag, innermost last
    let mut pending: Vec<(usize, Range<usize>)> = Vec::new();
    let mut spans: Vec<ElementSpan> = Vec::new();
    let mut pos = 0usize;

    loop {
        let event = reader.read_event()?;
        let pos_after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(name);
                if stack_matches(&stack, &segments) {
                    pending.push((stack.len(), pos..pos_after));
                }
            }
            Event::End(_) => {
                if let Some((depth, start_tag)) = pending.last().cloned() {
                    if depth == stack.len() {
                        pending.pop();
                        spans.push(ElementSpan {
                            full: start_tag.start..pos_after,
                            start_tag,
                            self_closing: false,
                        });
                    }
                }
                stack.pop();
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(name);
                if stack_matches(&stack, &segments) {
                    spans.push(ElementSpan {
                        start_tag: pos..pos_after,
                        full: pos..pos_after,
                        self_closing: true,
                    });
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }

        pos = pos_after;
    }

    if !stack.is_empty() {
        return Err(StructuralError::Truncated(stack.len()));
    }

    spans.sort_by_key(|span| span.full.start);
    Ok(spans)
}

fn stack_matches(stack: &[String], segments: &[&str]) -> bool {
    stack.len() >= segments.len()
        && stack[stack.len() - segments.len()..]
            .iter()
            .zip(segments)
            .all(|(have, want)| have == want)
}

/// Byte span of the value of `attribute` inside a start tag, if present.
pub fn attribute_value_span(
    xml: &str,
    start_tag: &Range<usize>,
    attribute: &str,
) -> Option<Range<usize>> {
    let pattern = format!(r#"\s{}\s*=\s*"([^"]*)""#, regex::escape(attribute));
    let re = Regex::new(&pattern).expect("escaped attribute always yields a valid pattern");
    let tag = &xml[start_tag.clone()];
    let caps = re.captures(tag)?;
    let value = caps.get(1)?;
    Some(start_tag.start + value.start()..start_tag.start + value.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5">
	<GroupDevicePreset>
		<Device>
			<Tempo Value="120" />
			<Chain Id="0">
				<Name Value="Kick" />
			</Chain>
			<Chain Id="1">
				<Name Value="Snare" />
			</Chain>
		</Device>
	</GroupDevicePreset>
</Ableton>
"#;

    #[test]
    fn test_locate_self_closing() {
        let spans = locate(SAMPLE, "Device/Tempo").unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].self_closing);
        assert_eq!(&SAMPLE[spans[0].full.clone()], r#"<Tempo Value="120" />"#);
    }

    #[test]
    fn test_locate_suffix_path() {
        // a bare element name matches anywhere in the tree
        let spans = locate(SAMPLE, "Chain").unwrap();
        assert_eq!(spans.len(), 2);
        assert!(!spans[0].self_closing);
        assert!(SAMPLE[spans[0].full.clone()].starts_with(r#"<Chain Id="0">"#));
        assert!(SAMPLE[spans[0].full.clone()].ends_with("</Chain>"));
        assert!(spans[0].full.start < spans[1].full.start);
    }

    #[test]
    fn test_locate_full_element_extent() {
        let spans = locate(SAMPLE, "GroupDevicePreset").unwrap();
        assert_eq!(spans.len(), 1);
        let text = &SAMPLE[spans[0].full.clone()];
        assert!(text.starts_with("<GroupDevicePreset>"));
        assert!(text.ends_with("</GroupDevicePreset>"));
        assert!(text.contains("Snare"));
    }

    #[test]
    fn test_locate_missing_element() {
        assert!(locate(SAMPLE, "NoSuchElement").unwrap().is_empty());
    }

    #[test]
    fn test_nested_same_name_elements() {
        let xml = "<Root><Chain><Chain><Leaf /></Chain></Chain></Root>";
        let spans = locate(xml, "Chain").unwrap();
        assert_eq!(spans.len(), 2);
        // outer first in document order
        assert!(spans[0].full.start < spans[1].full.start);
        assert!(spans[0].full.end > spans[1].full.end);
    }

    #[test]
    fn test_attribute_value_span() {
        let spans = locate(SAMPLE, "Device/Tempo").unwrap();
        let value = attribute_value_span(SAMPLE, &spans[0].start_tag, "Value").unwrap();
        assert_eq!(&SAMPLE[value], "120");
    }

    #[test]
    fn test_attribute_missing() {
        let spans = locate(SAMPLE, "Device/Tempo").unwrap();
        assert!(attribute_value_span(SAMPLE, &spans[0].start_tag, "Nope").is_none());
    }

    #[test]
    fn test_attribute_name_is_not_substring_matched() {
        let xml = r#"<Root><El BigValue="9" Value="1" /></Root>"#;
        let spans = locate(xml, "El").unwrap();
        let value = attribute_value_span(xml, &spans[0].start_tag, "Value").unwrap();
        assert_eq!(&xml[value], "1");
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(locate("<Root><Unclosed>", "Root").is_err());
    }
}
