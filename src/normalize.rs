//! XML → [`Node`] normalization.
//!
//! Walks a well-formed XML document with quick-xml and builds the nested
//! document model. The walk keeps an explicit frame stack; each frame
//! accumulates attributes, child elements, and text, and is turned into a
//! [`Node`] when its end tag arrives:
//!
//! - no attributes and no children ⇒ the trimmed text as a bare scalar
//!   (whitespace-only text counts as no text);
//! - otherwise an object with `@`-prefixed attribute keys, one entry per
//!   child tag, and non-empty trimmed text under `#text`.
//!
//! Children are grouped per tag after the element closes, so a tag seen
//! three times becomes a three-element list and a tag seen once stays a
//! single value — no scalar is ever mutated into a list mid-walk.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::{Node, ATTR_PREFIX, TEXT_KEY};

/// Element name wrapping one search hit in a find-reports response.
const SUMMARY_TAG: &str = "landing_report_summary";

/// Parse a full XML document into its normalized [`Node`] form.
///
/// Pure and total over well-formed input; malformed XML (including a
/// blank string) is an error.
pub fn parse_document(xml: &str) -> Result<Node> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Frame::open(&start)?),
            Ok(Event::Empty(start)) => {
                let node = Frame::open(&start)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.children.push((tag_name(&start), node)),
                    // Document is a single empty element.
                    None => return Ok(node),
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape()?);
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok(Event::End(_)) => {
                let frame = match stack.pop() {
                    Some(f) => f,
                    None => bail!("malformed XML: unmatched end tag"),
                };
                let name = frame.name.clone();
                let node = frame.close();
                match stack.last_mut() {
                    Some(parent) => parent.children.push((name, node)),
                    None => return Ok(node),
                }
            }
            Ok(Event::Eof) => bail!("malformed XML: no root element"),
            Ok(_) => {}
            Err(e) => bail!(
                "malformed XML at offset {}: {}",
                reader.buffer_position(),
                e
            ),
        }
    }
}

/// Parse a find-reports response and return every `landing_report_summary`
/// element, in response order.
pub fn parse_summaries(xml: &str) -> Result<Vec<Node>> {
    let root = parse_document(xml)?;
    Ok(root.find_all(SUMMARY_TAG).into_iter().cloned().collect())
}

/// One open element during the walk.
struct Frame {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<(String, Node)>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            attrs.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ));
        }
        Ok(Frame {
            name: tag_name(start),
            attrs,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Build the node for a closed element, applying the collapsing and
    /// list-coalescing rules.
    fn close(self) -> Node {
        let text = self.text.trim();

        if self.attrs.is_empty() && self.children.is_empty() {
            return Node::Scalar(text.to_string());
        }

        let mut map = BTreeMap::new();
        for (key, value) in self.attrs {
            map.insert(format!("{}{}", ATTR_PREFIX, key), Node::Scalar(value));
        }

        // Group children by tag, preserving document order within a tag.
        let mut grouped: BTreeMap<String, Vec<Node>> = BTreeMap::new();
        for (name, node) in self.children {
            grouped.entry(name).or_default().push(node);
        }
        for (name, mut nodes) in grouped {
            let value = if nodes.len() == 1 {
                nodes.remove(0)
            } else {
                Node::List(nodes)
            };
            map.insert(name, value);
        }

        if !text.is_empty() {
            map.insert(TEXT_KEY.to_string(), Node::Scalar(text.to_string()));
        }

        Node::Object(map)
    }
}

fn tag_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_collapses_to_trimmed_text() {
        assert_eq!(
            parse_document("<date_of_landing> 2017-01-02 </date_of_landing>").unwrap(),
            Node::Scalar("2017-01-02".to_string())
        );
    }

    #[test]
    fn whitespace_only_text_counts_as_empty() {
        assert_eq!(
            parse_document("<notes>   \n  </notes>").unwrap(),
            Node::Scalar(String::new())
        );
        assert_eq!(
            parse_document("<notes/>").unwrap(),
            Node::Scalar(String::new())
        );
    }

    #[test]
    fn attributes_become_prefixed_keys_without_text_key() {
        let node = parse_document(r#"<vessel name="PACIFIC DAWN">  </vessel>"#).unwrap();
        assert_eq!(node.attr("name"), Some("PACIFIC DAWN"));
        assert_eq!(node.get("#text"), None);
    }

    #[test]
    fn text_beside_attributes_goes_under_text_key() {
        let node = parse_document(r#"<status desc="Final Report Submitted">IFQ</status>"#).unwrap();
        assert_eq!(node.attr("desc"), Some("Final Report Submitted"));
        assert_eq!(node.text(), Some("IFQ"));
    }

    #[test]
    fn repeated_children_coalesce_in_document_order() {
        let node = parse_document(
            "<report><item>a</item><item>b</item><item>c</item></report>",
        )
        .unwrap();
        assert_eq!(
            node.get("item"),
            Some(&Node::List(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn single_child_stays_non_list() {
        let node = parse_document("<report><item>a</item></report>").unwrap();
        assert_eq!(node.get("item"), Some(&"a".into()));
    }

    #[test]
    fn mixed_text_and_children_keeps_both() {
        let node =
            parse_document(r#"<permit kind="cfec">S04K<seq>2</seq></permit>"#).unwrap();
        assert_eq!(node.text(), Some("S04K"));
        assert_eq!(node.get("seq"), Some(&"2".into()));
        assert_eq!(node.attr("kind"), Some("cfec"));
    }

    #[test]
    fn entities_are_unescaped() {
        let node = parse_document("<name>SEA &amp; SKY</name>").unwrap();
        assert_eq!(node, Node::Scalar("SEA & SKY".to_string()));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("not xml at all").is_err());
    }

    #[test]
    fn normalization_is_idempotent() {
        let xml = r#"<landing_report data_entry_user="jsmith">
            <landing_report_id>304327</landing_report_id>
            <line_item><item_number>1</item_number></line_item>
            <line_item><item_number>2</item_number></line_item>
        </landing_report>"#;
        assert_eq!(parse_document(xml).unwrap(), parse_document(xml).unwrap());
    }

    #[test]
    fn summaries_found_at_any_depth() {
        let xml = r#"<report_search_result>
            <count>2</count>
            <reports>
                <landing_report_summary>
                    <landing_report_id>11</landing_report_id>
                </landing_report_summary>
                <landing_report_summary>
                    <landing_report_id>12</landing_report_id>
                </landing_report_summary>
            </reports>
        </report_search_result>"#;
        let stubs = parse_summaries(xml).unwrap();
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].report_id(), Some("11".to_string()));
        assert_eq!(stubs[1].report_id(), Some("12".to_string()));
    }

    #[test]
    fn one_summary_is_still_one_stub() {
        let xml = "<r><landing_report_summary><landing_report_id>9</landing_report_id></landing_report_summary></r>";
        assert_eq!(parse_summaries(xml).unwrap().len(), 1);
    }
}
