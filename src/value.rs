// Value materialization boundary
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of TAME.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Delivery of `<Value>` subtrees to an external materializer.
//!
//! The loader does not interpret values.
//! Instead,
//!   the router mirrors its own state transitions within a `<Value>`
//!   element onto a [`ValueHandler`]:
//!
//!   1. [`ValueHandler::new_value`] when `<Value>` opens;
//!   2. [`ValueHandler::element_start`] and [`ValueHandler::element_end`]
//!        for every element nested within it; and
//!   3. [`ValueHandler::finish`] when `</Value>` closes.
//!
//! The raw XML of the value is additionally retained on the node
//!   (see [`NodeValue`](crate::node::NodeValue)),
//!     so a handler that ignores all events
//!     (such as [`NoValues`])
//!     loses nothing.
//!
//! [`ValueTree`] is a handler that records each value as a tree of
//!   [`ValueElement`]s.

use crate::node::Node;

/// Opaque handle identifying a value to its [`ValueHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueHandle(usize);

impl ValueHandle {
    /// Handle for the value at `index` of a handler's own bookkeeping.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Receiver of `<Value>` subtree events.
///
/// Element names are local names with any namespace prefix removed.
/// All text is borrowed from the arena of the document being loaded.
pub trait ValueHandler<'a> {
    /// Begin a new value for `node`.
    fn new_value(&mut self, node: &Node<'a>) -> ValueHandle;

    /// An element named `name` opened within the value.
    fn element_start(&mut self, handle: ValueHandle, name: &'a str);

    /// The element named `name` closed.
    ///
    /// `text` is the character data of the element,
    ///   if it had any that was not whitespace.
    fn element_end(
        &mut self,
        handle: ValueHandle,
        name: &'a str,
        text: Option<&'a str>,
    );

    /// The `<Value>` element closed.
    fn finish(&mut self, handle: ValueHandle);
}

/// Handler that discards all value events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoValues;

impl<'a> ValueHandler<'a> for NoValues {
    fn new_value(&mut self, _node: &Node<'a>) -> ValueHandle {
        ValueHandle::new(0)
    }

    fn element_start(&mut self, _handle: ValueHandle, _name: &'a str) {}

    fn element_end(
        &mut self,
        _handle: ValueHandle,
        _name: &'a str,
        _text: Option<&'a str>,
    ) {
    }

    fn finish(&mut self, _handle: ValueHandle) {}
}

/// Element of a collected value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueElement<'a> {
    pub name: &'a str,
    pub text: Option<&'a str>,
    pub children: Vec<ValueElement<'a>>,
}

impl<'a> ValueElement<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            text: None,
            children: Vec::new(),
        }
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&ValueElement<'a>> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// A value collected by [`ValueTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedValue<'a> {
    /// Node that declared the value.
    pub node: crate::id::NodeId<'a>,

    /// Top-level elements of the value
    ///   (typically exactly one).
    pub elements: Vec<ValueElement<'a>>,
}

/// Handler collecting every value as a tree of [`ValueElement`]s.
///
/// Handles are indexes into the collected values,
///   so [`ValueTree::get`] may be used with the handle stored on a node.
#[derive(Debug, Default)]
pub struct ValueTree<'a> {
    values: Vec<CollectedValue<'a>>,
    open: Vec<ValueElement<'a>>,
}

impl<'a> ValueTree<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, handle: ValueHandle) -> Option<&CollectedValue<'a>> {
        self.values.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectedValue<'a>> {
        self.values.iter()
    }
}

impl<'a> ValueHandler<'a> for ValueTree<'a> {
    fn new_value(&mut self, node: &Node<'a>) -> ValueHandle {
        self.open.clear();
        self.values.push(CollectedValue {
            node: node.id,
            elements: Vec::new(),
        });

        ValueHandle::new(self.values.len() - 1)
    }

    fn element_start(&mut self, _handle: ValueHandle, name: &'a str) {
        self.open.push(ValueElement::new(name));
    }

    fn element_end(
        &mut self,
        handle: ValueHandle,
        name: &'a str,
        text: Option<&'a str>,
    ) {
        let Some(mut ele) = self.open.pop() else {
            return;
        };

        debug_assert_eq!(ele.name, name);
        ele.text = text;

        match self.open.last_mut() {
            Some(parent) => parent.children.push(ele),
            None => {
                if let Some(value) = self.values.get_mut(handle.0) {
                    value.elements.push(ele)
                }
            }
        }
    }

    fn finish(&mut self, _handle: ValueHandle) {
        // Unbalanced input leaves elements open;
        //   they are not part of the value.
        self.open.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{id::NodeId, node::NodeClass};

    #[test]
    fn collects_nested_elements() {
        let node = Node::new(NodeClass::Variable, NodeId::new(1, "i=6001"));
        let mut sut = ValueTree::new();

        let handle = sut.new_value(&node);
        sut.element_start(handle, "ListOfInt32");
        sut.element_start(handle, "Int32");
        sut.element_end(handle, "Int32", Some("1"));
        sut.element_start(handle, "Int32");
        sut.element_end(handle, "Int32", Some("2"));
        sut.element_end(handle, "ListOfInt32", None);
        sut.finish(handle);

        let value = sut.get(handle).expect("missing value");
        assert_eq!(node.id, value.node);
        assert_eq!(1, value.elements.len());

        let list = &value.elements[0];
        assert_eq!("ListOfInt32", list.name);
        assert_eq!(None, list.text);
        assert_eq!(
            vec![Some("1"), Some("2")],
            list.children.iter().map(|c| c.text).collect::<Vec<_>>()
        );
    }

    #[test]
    fn handles_index_values_in_order() {
        let a = Node::new(NodeClass::Variable, NodeId::new(1, "i=1"));
        let b = Node::new(NodeClass::Variable, NodeId::new(1, "i=2"));
        let mut sut = ValueTree::new();

        let ha = sut.new_value(&a);
        sut.finish(ha);
        let hb = sut.new_value(&b);
        sut.element_start(hb, "Double");
        sut.element_end(hb, "Double", Some("1.5"));
        sut.finish(hb);

        assert_eq!(2, sut.len());
        assert!(sut.get(ha).expect("missing a").elements.is_empty());
        assert_eq!(
            Some("1.5"),
            sut.get(hb)
                .and_then(|v| v.elements.first())
                .and_then(|e| e.text)
        );
    }

    #[test]
    fn child_lookup_by_name() {
        let mut ele = ValueElement::new("LocalizedText");
        ele.children.push(ValueElement {
            name: "Text",
            text: Some("Pump"),
            children: vec![],
        });

        assert_eq!(Some("Pump"), ele.child("Text").and_then(|c| c.text));
        assert_eq!(None, ele.child("Locale"));
    }
}
