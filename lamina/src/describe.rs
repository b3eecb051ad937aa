//! JSON description of layout trees.
//!
//! Layouts are (de)serialized through a plain tagged description, and deserialization goes
//! through the same validating constructors as code does, so a layout file can never
//! produce a tree the constructors would refuse.
//!
//! ```json
//! {
//!   "kind": "struct",
//!   "name": "point",
//!   "members": [
//!     { "kind": "value", "carrier": "i32", "order": "big", "name": "x" },
//!     { "kind": "padding", "size": 4 },
//!     { "kind": "sequence", "count": 2, "element": { "kind": "value", "carrier": "f64" } }
//!   ]
//! }
//! ```
//!
//! Omitted `order` means native byte order, omitted `align` means natural alignment and an
//! omitted sequence `count` means an unbounded sequence.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LayoutResult;
use crate::layout::{ByteOrder, Carrier, Layout};

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum LayoutDesc {
    Value {
        carrier: Carrier,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<ByteOrder>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Padding {
        size: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Sequence {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
        element: Box<LayoutDesc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Struct {
        members: Vec<LayoutDesc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Union {
        members: Vec<LayoutDesc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl From<&Layout> for LayoutDesc {
    fn from(layout: &Layout) -> Self {
        let align = Some(layout.byte_alignment()).filter(|a| *a != layout.natural_alignment());
        let name = layout.name().map(str::to_string);
        match layout {
            Layout::Value(v) => {
                LayoutDesc::Value { carrier: v.carrier(), order: Some(v.order()), align, name }
            }
            Layout::Padding(_) => LayoutDesc::Padding { size: layout.byte_size(), align, name },
            Layout::Sequence(s) => LayoutDesc::Sequence {
                count: s.count(),
                element: Box::new(s.element().into()),
                align,
                name,
            },
            Layout::Struct(g) => {
                LayoutDesc::Struct { members: g.members().iter().map(Into::into).collect(), align, name }
            }
            Layout::Union(g) => {
                LayoutDesc::Union { members: g.members().iter().map(Into::into).collect(), align, name }
            }
        }
    }
}

fn finish(layout: Layout, align: Option<usize>, name: Option<String>) -> LayoutResult<Layout> {
    let layout = match align {
        Some(align) => layout.with_byte_alignment(align)?,
        None => layout,
    };
    Ok(match name {
        Some(name) => layout.with_name(&name),
        None => layout,
    })
}

fn build_all(members: Vec<LayoutDesc>) -> LayoutResult<Vec<Layout>> {
    members.into_iter().map(LayoutDesc::build).collect()
}

impl LayoutDesc {
    fn build(self) -> LayoutResult<Layout> {
        match self {
            LayoutDesc::Value { carrier, order, align, name } => {
                let layout = Layout::value(carrier).with_byte_order(order.unwrap_or(ByteOrder::NATIVE));
                finish(layout, align, name)
            }
            LayoutDesc::Padding { size, align, name } => finish(Layout::padding(size), align, name),
            LayoutDesc::Sequence { count, element, align, name } => {
                let element = element.build()?;
                let layout = match count {
                    Some(count) => Layout::sequence(count, element)?,
                    None => Layout::unbounded(element)?,
                };
                finish(layout, align, name)
            }
            LayoutDesc::Struct { members, align, name } => {
                finish(Layout::structure(build_all(members)?)?, align, name)
            }
            LayoutDesc::Union { members, align, name } => {
                finish(Layout::union(build_all(members)?)?, align, name)
            }
        }
    }
}

impl Serialize for Layout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        LayoutDesc::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        LayoutDesc::deserialize(deserializer)?.build().map_err(serde::de::Error::custom)
    }
}

impl Layout {
    pub fn from_json(json: &str) -> Result<Layout, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
