//! Depth-first rewriting of layout trees.
//!
//! A [`Transformer`] holds optional replacement functions, one per node kind. A node is
//! first replaced by the function registered for its kind (falling back to the catch-all
//! `any` function), then the children of the replacement are transformed the same way and
//! the composite is rebuilt with the name and alignment of the replacement copied forward.
//! Unions stay unions.
//!
//! ```ignore
//! let big = Transformer::new()
//!     .on_values(|v| Ok(Layout::Value(v.with_order(ByteOrder::Big))));
//! let flipped = layout.transform(&big)?;
//! ```

use crate::error::LayoutResult;
use crate::layout::{ByteOrder, GroupLayout, Layout, PaddingLayout, SequenceLayout, ValueLayout};

type Rewrite<'f, N> = Box<dyn Fn(&N) -> LayoutResult<Layout> + 'f>;

#[derive(Default)]
pub struct Transformer<'f> {
    values: Option<Rewrite<'f, ValueLayout>>,
    paddings: Option<Rewrite<'f, PaddingLayout>>,
    sequences: Option<Rewrite<'f, SequenceLayout>>,
    structs: Option<Rewrite<'f, GroupLayout>>,
    unions: Option<Rewrite<'f, GroupLayout>>,
    any: Option<Rewrite<'f, Layout>>,
}

impl<'f> Transformer<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_values(mut self, f: impl Fn(&ValueLayout) -> LayoutResult<Layout> + 'f) -> Self {
        self.values = Some(Box::new(f));
        self
    }

    pub fn on_paddings(mut self, f: impl Fn(&PaddingLayout) -> LayoutResult<Layout> + 'f) -> Self {
        self.paddings = Some(Box::new(f));
        self
    }

    pub fn on_sequences(
        mut self,
        f: impl Fn(&SequenceLayout) -> LayoutResult<Layout> + 'f,
    ) -> Self {
        self.sequences = Some(Box::new(f));
        self
    }

    pub fn on_structs(mut self, f: impl Fn(&GroupLayout) -> LayoutResult<Layout> + 'f) -> Self {
        self.structs = Some(Box::new(f));
        self
    }

    pub fn on_unions(mut self, f: impl Fn(&GroupLayout) -> LayoutResult<Layout> + 'f) -> Self {
        self.unions = Some(Box::new(f));
        self
    }

    /// Applies to every node whose kind has no dedicated function.
    pub fn on_any(mut self, f: impl Fn(&Layout) -> LayoutResult<Layout> + 'f) -> Self {
        self.any = Some(Box::new(f));
        self
    }

    fn shallow(&self, layout: &Layout) -> LayoutResult<Layout> {
        let specific = match layout {
            Layout::Value(v) => self.values.as_ref().map(|f| f(v)),
            Layout::Padding(p) => self.paddings.as_ref().map(|f| f(p)),
            Layout::Sequence(s) => self.sequences.as_ref().map(|f| f(s)),
            Layout::Struct(g) => self.structs.as_ref().map(|f| f(g)),
            Layout::Union(g) => self.unions.as_ref().map(|f| f(g)),
        };
        match (specific, &self.any) {
            (Some(result), _) => result,
            (None, Some(any)) => any(layout),
            (None, None) => Ok(layout.clone()),
        }
    }
}

impl Layout {
    /// Rewrites this tree with `t`. See the module documentation for the traversal order.
    pub fn transform(&self, t: &Transformer<'_>) -> LayoutResult<Layout> {
        let outer = t.shallow(self)?;
        let rebuilt = match &outer {
            Layout::Value(_) | Layout::Padding(_) => return Ok(outer),
            Layout::Sequence(s) => {
                let element = s.element().transform(t)?;
                match s.count() {
                    Some(count) => Layout::sequence(count, element)?,
                    None => Layout::unbounded(element)?,
                }
            }
            Layout::Struct(g) => Layout::structure(transform_members(g, t)?)?,
            Layout::Union(g) => Layout::union(transform_members(g, t)?)?,
        };
        copy_attributes(&outer, rebuilt)
    }
}

fn transform_members(group: &GroupLayout, t: &Transformer<'_>) -> LayoutResult<Vec<Layout>> {
    group.members().iter().map(|m| m.transform(t)).collect()
}

fn copy_attributes(source: &Layout, target: Layout) -> LayoutResult<Layout> {
    let target = target.with_byte_alignment(source.byte_alignment().max(target.byte_alignment()))?;
    Ok(match source.name() {
        Some(name) => target.with_name(name),
        None => target.without_name(),
    })
}

/// Every value in the tree switched to `order`.
pub fn with_byte_order(layout: &Layout, order: ByteOrder) -> LayoutResult<Layout> {
    layout.transform(&Transformer::new().on_values(|v| Ok(Layout::Value(v.with_order(order)))))
}

/// The tree with every name removed, the root's included.
pub fn without_names(layout: &Layout) -> LayoutResult<Layout> {
    layout.transform(&Transformer::new().on_any(|l| Ok(l.without_name())))
}
