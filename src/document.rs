//! The nested document model for normalized landing reports.
//!
//! A report is a tree of [`Node`]s mirroring the XML it was parsed from:
//! attributes become `@`-prefixed keys, element text lives under `#text`
//! when it has siblings, and repeated child tags become lists. Leaf
//! elements with nothing but text collapse to a bare scalar, which keeps
//! stored documents compact for the common case (dates, codes, counts).
//!
//! The JSON rendering of a `Node` is the on-disk document format:
//!
//! ```json
//! {
//!   "@last_change_user": "jsmith",
//!   "landing_report_id": "304327",
//!   "status": { "#text": "IFQ", "@desc": "Final Report Submitted" },
//!   "line_item": [ { "item_number": "1", "weight": "1200.0" } ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix for attribute keys inside an [`Node::Object`].
pub const ATTR_PREFIX: &str = "@";

/// Reserved key holding a node's own text when it also has attributes
/// or children.
pub const TEXT_KEY: &str = "#text";

/// Element name of the root of a landing report document.
pub const REPORT_ID_FIELD: &str = "landing_report_id";

/// One node of a normalized document.
///
/// Serializes untagged, so a `Scalar` is a JSON string, a `List` a JSON
/// array, and an `Object` a JSON object — the same shape the sync has
/// always written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Text-only leaf (no attributes, no children).
    Scalar(String),
    /// Repeated sibling elements sharing one tag, in document order.
    List(Vec<Node>),
    /// Element with attributes and/or named children.
    Object(BTreeMap<String, Node>),
}

impl Node {
    /// Look up a child entry by key. `None` for scalars and lists.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// The node's own text: the scalar itself, or the `#text` entry of a
    /// decorated element.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            Node::Object(map) => match map.get(TEXT_KEY) {
                Some(Node::Scalar(s)) => Some(s),
                _ => None,
            },
            Node::List(_) => None,
        }
    }

    /// An attribute value (`@name`, `@desc`, ...), if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self.get(&format!("{}{}", ATTR_PREFIX, name)) {
            Some(Node::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    /// View this node as a list of items.
    ///
    /// An element that happened to occur once parses as a single node
    /// rather than a one-element list; callers iterating sub-collections
    /// (line items, stat areas) use this to handle both shapes.
    pub fn items(&self) -> Vec<&Node> {
        match self {
            Node::List(nodes) => nodes.iter().collect(),
            other => vec![other],
        }
    }

    /// Best-effort display string for a field: its text, else its `name`
    /// attribute, else empty.
    pub fn display_value(&self) -> String {
        self.text()
            .or_else(|| self.attr("name"))
            .unwrap_or_default()
            .to_string()
    }

    /// Extract the report identifier from a document root, unwrapping a
    /// decorated `{ "#text": "123", ... }` id.
    pub fn report_id(&self) -> Option<String> {
        self.get(REPORT_ID_FIELD)
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Collect every descendant entry named `key`, in document order.
    ///
    /// A list-valued match contributes each of its elements, so callers
    /// see one node per occurrence regardless of how siblings coalesced.
    pub fn find_all<'a>(&'a self, key: &str) -> Vec<&'a Node> {
        let mut out = Vec::new();
        self.collect_named(key, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, key: &str, out: &mut Vec<&'a Node>) {
        match self {
            Node::Object(map) => {
                for (name, value) in map {
                    if name == key {
                        match value {
                            Node::List(nodes) => out.extend(nodes.iter()),
                            other => out.push(other),
                        }
                    } else {
                        value.collect_named(key, out);
                    }
                }
            }
            Node::List(nodes) => {
                for node in nodes {
                    node.collect_named(key, out);
                }
            }
            Node::Scalar(_) => {}
        }
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(s)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(s.to_string())
    }
}
