// UANodeSet parser event router
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

//! Construction of a [`NodeSet`] from UANodeSet XML events.
//!
//! The router is a state machine driven by the events of a
//!   [`NodesetXmlReader`].
//! Each recognized element pushes a [`State`] onto a bounded stack and
//!   its end tag pops it,
//!     finalizing whatever construct the element represented
//!     (a namespace, an alias, a node, a reference, and so on).
//!
//! Elements that are not recognized in the current state are skipped in
//!   their entirety:
//!     the router enters [`State::Unknown`] and merely counts nesting
//!     depth until the element closes.
//! The same is done for the content of `<Value>`,
//!   except that its events are forwarded to a [`ValueHandler`] and its
//!   verbatim XML is retained on the node.
//!
//! Character data is accumulated into an arena-backed buffer only for
//!   those states that need it.
//!
//! Reference classification
//! ========================
//! Each reference is classified as soon as its target is known
//!   (see [`RefClassifier`]).
//! A node whose references are all classified is added to the
//!   [`DependencySort`] when it closes;
//!     any other node is held until the end of the document,
//!       when all reference types have been seen,
//!       and classification is retried.
//!
//! Errors
//! ======
//! - [`ImportError::Namespace`] if the document uses a namespace index it
//!     did not declare.
//! - [`ImportError::NestingTooDeep`] if recognized elements nest beyond
//!     [`global::MAX_STATE_DEPTH`].
//! - [`ImportError::UnresolvedReference`] if a node still has
//!     unclassifiable references at the end of the document.

use super::reader::{attr, Attr, NodesetXmlReader, XmlSink};
use crate::arena::{Arena, TextBuf};
use crate::global;
use crate::id::{well_known, AliasTable, NodeId};
use crate::ld::{ImportError, ImportResult};
use crate::node::{
    DataTypeDefinition, DataTypeField, LocalizedText, Node, NodeAttrs,
    NodeClass, NodeRef, NodeSet, NodeValue, QualifiedName, Reference,
};
use crate::ns::{NamespaceRegistry, NamespaceTable};
use crate::refs::RefClassifier;
use crate::sort::DependencySort;
use crate::value::{ValueHandle, ValueHandler};
use arrayvec::ArrayVec;
use memchr::memrchr;
use std::str::FromStr;

/// A parsed UANodeSet document.
#[derive(Debug)]
pub struct Document<'a> {
    pub nodes: NodeSet<'a>,
    pub namespaces: NamespaceTable<'a>,
    pub aliases: AliasTable<'a>,

    /// Classifier after having seen every reference type of the
    ///   document.
    pub classifier: RefClassifier<'a>,

    /// Dependency graph of every node of the document.
    pub sort: DependencySort<'a>,
}

/// Parser of UANodeSet documents.
///
/// Text of the document is copied into `arena` as needed,
///   and so the resulting [`Document`] lives as long as the arena rather
///   than the input.
pub struct NodesetParser<'a> {
    arena: &'a Arena,
    classifier: RefClassifier<'a>,
}

impl<'a> NodesetParser<'a> {
    /// Create a parser that classifies references starting from the
    ///   knowledge of `classifier`.
    pub fn new(arena: &'a Arena, classifier: RefClassifier<'a>) -> Self {
        Self { arena, classifier }
    }

    /// Parse the document `input`.
    ///
    /// Each namespace the document declares is registered with `registry`
    ///   and each `<Value>` is delivered to `values`.
    pub fn parse<N, V>(
        self,
        input: &str,
        registry: &mut N,
        values: &mut V,
    ) -> ImportResult<Document<'a>>
    where
        N: NamespaceRegistry + ?Sized,
        V: ValueHandler<'a> + ?Sized,
    {
        let mut reader = NodesetXmlReader::new(input);

        let mut router = Router {
            arena: self.arena,
            input,
            registry,
            values,
            stack: ArrayVec::new(),
            text: None,
            nodes: NodeSet::new(),
            namespaces: NamespaceTable::new(),
            aliases: AliasTable::new(),
            classifier: self.classifier,
            sort: DependencySort::new(),
            pending: Vec::new(),
            node: None,
            alias: None,
            locale: None,
            reference: None,
            value: None,
            definition: None,
        };

        router.stack.push(State::Init);
        reader.run(&mut router)?;
        router.finish()
    }
}

/// Parser state.
///
/// The stack of states mirrors the stack of recognized open elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Outside of any element.
    Init,

    /// Within the root `<UANodeSet>`.
    NodeSet,
    NamespaceUris,
    Uri,
    Aliases,
    Alias,

    /// Within a node element (`<UAObject>`, `<UAVariable>`, etc).
    Node,
    DisplayName,
    Description,
    InverseName,
    References,
    Reference,

    /// Within `<Value>`,
    ///   at the given depth of nested elements.
    Value(usize),
    Definition,
    Field,

    /// Within an unrecognized element,
    ///   at the given depth.
    Unknown(usize),
}

/// Reference awaiting its target.
#[derive(Debug, Clone, Copy)]
struct RefDraft<'a> {
    ref_type: NodeId<'a>,
    is_forward: bool,
}

/// `<Value>` being captured.
#[derive(Debug, Clone, Copy)]
struct ValueCapture {
    handle: ValueHandle,

    /// Byte offset just past `<Value>`.
    start: usize,
}

struct Router<'a, 'p, N: ?Sized, V: ?Sized> {
    arena: &'a Arena,
    input: &'p str,
    registry: &'p mut N,
    values: &'p mut V,

    stack: ArrayVec<State, { global::MAX_STATE_DEPTH }>,
    text: Option<TextBuf<'a>>,

    nodes: NodeSet<'a>,
    namespaces: NamespaceTable<'a>,
    aliases: AliasTable<'a>,
    classifier: RefClassifier<'a>,
    sort: DependencySort<'a>,

    /// Nodes with unclassified references.
    pending: Vec<NodeRef>,

    node: Option<Node<'a>>,
    alias: Option<&'a str>,
    locale: Option<&'a str>,
    reference: Option<RefDraft<'a>>,
    value: Option<ValueCapture>,
    definition: Option<DataTypeDefinition<'a>>,
}

impl<'a, 'p, N, V> XmlSink for Router<'a, 'p, N, V>
where
    N: NamespaceRegistry + ?Sized,
    V: ValueHandler<'a> + ?Sized,
{
    type Error = ImportError;

    fn open(
        &mut self,
        name: &str,
        attrs: &[Attr],
        pos: usize,
    ) -> ImportResult<()> {
        let state = self.stack.last().copied().unwrap_or(State::Init);

        match state {
            State::Unknown(depth) => return self.replace(State::Unknown(depth + 1)),

            State::Value(depth) => {
                if let Some(capture) = self.value {
                    let name = self.arena.alloc_str(name);
                    self.values.element_start(capture.handle, name);
                }

                self.begin_text();
                return self.replace(State::Value(depth + 1));
            }

            _ => (),
        }

        let class = self.node.as_ref().map(Node::class);

        let next = match (state, name) {
            (State::Init, "UANodeSet") => State::NodeSet,

            (State::Init | State::NodeSet, "NamespaceUris") => {
                State::NamespaceUris
            }
            (State::NamespaceUris, "Uri") => {
                self.begin_text();
                State::Uri
            }

            (State::Init | State::NodeSet, "Aliases") => State::Aliases,
            (State::Aliases, "Alias") => {
                self.alias = attr(attrs, "Alias")
                    .and_then(|name| self.arena.alloc_nonempty(name.trim()));
                self.begin_text();
                State::Alias
            }

            (State::Init | State::NodeSet, tag) => {
                match NodeClass::from_tag(tag) {
                    Some(class) => {
                        self.begin_node(class, attrs)?;
                        State::Node
                    }
                    None => State::Unknown(1),
                }
            }

            (State::Node, "DisplayName") => {
                self.begin_localized(attrs);
                State::DisplayName
            }
            (State::Node, "Description") => {
                self.begin_localized(attrs);
                State::Description
            }
            (State::Node, "InverseName")
                if class == Some(NodeClass::ReferenceType) =>
            {
                self.begin_localized(attrs);
                State::InverseName
            }

            (State::Node, "References") => State::References,
            (State::References, "Reference") => {
                self.begin_reference(attrs)?;
                State::Reference
            }

            (State::Node, "Value")
                if matches!(
                    class,
                    Some(NodeClass::Variable | NodeClass::VariableType)
                ) =>
            {
                self.begin_value(pos);
                State::Value(0)
            }

            (State::Node, "Definition")
                if class == Some(NodeClass::DataType) =>
            {
                self.begin_definition(attrs);
                State::Definition
            }
            (State::Definition, "Field") => {
                self.begin_field(attrs)?;
                State::Field
            }

            _ => State::Unknown(1),
        };

        self.push(next)
    }

    fn close(&mut self, name: &str, pos: usize) -> ImportResult<()> {
        match self.stack.last().copied() {
            Some(State::Unknown(depth)) if depth > 1 => {
                return self.replace(State::Unknown(depth - 1));
            }

            Some(State::Value(depth)) if depth > 0 => {
                let text = self.take_text();

                if let Some(capture) = self.value {
                    let name = self.arena.alloc_str(name);
                    self.values.element_end(capture.handle, name, text);
                }

                // Collect any text that follows a nested element.
                self.begin_text();
                return self.replace(State::Value(depth - 1));
            }

            _ => (),
        }

        match self.stack.pop() {
            Some(State::Uri) => self.end_uri(),
            Some(State::Alias) => self.end_alias()?,
            Some(State::Node) => self.end_node(),
            Some(State::DisplayName) => {
                let text = self.end_localized();

                if let Some(node) = self.node.as_mut() {
                    node.display_name = node.display_name.or(Some(text));
                }
            }
            Some(State::Description) => {
                let text = self.end_localized();

                if let Some(node) = self.node.as_mut() {
                    node.description = node.description.or(Some(text));
                }
            }
            Some(State::InverseName) => {
                let text = self.end_localized();

                if let Some(NodeAttrs::ReferenceType(attrs)) =
                    self.node.as_mut().map(|node| &mut node.attrs)
                {
                    attrs.inverse_name = attrs.inverse_name.or(Some(text));
                }
            }
            Some(State::Reference) => self.end_reference()?,
            Some(State::Value(_)) => self.end_value(pos),
            Some(State::Definition) => self.end_definition(),

            Some(
                State::Init
                | State::NodeSet
                | State::NamespaceUris
                | State::Aliases
                | State::References
                | State::Field
                | State::Unknown(_),
            )
            | None => (),
        }

        Ok(())
    }

    fn text(&mut self, text: &str) -> ImportResult<()> {
        if let Some(buf) = self.text.as_mut() {
            // Leading whitespace is never significant.
            if !(buf.is_empty() && text.trim().is_empty()) {
                buf.push_str(text);
            }
        }

        Ok(())
    }
}

impl<'a, 'p, N, V> Router<'a, 'p, N, V>
where
    N: NamespaceRegistry + ?Sized,
    V: ValueHandler<'a> + ?Sized,
{
    fn push(&mut self, state: State) -> ImportResult<()> {
        self.stack
            .try_push(state)
            .map_err(|_| ImportError::NestingTooDeep(global::MAX_STATE_DEPTH))
    }

    fn replace(&mut self, state: State) -> ImportResult<()> {
        if let Some(top) = self.stack.last_mut() {
            *top = state;
        }

        Ok(())
    }

    fn begin_text(&mut self) {
        self.text = Some(self.arena.text_buf());
    }

    /// Character data accumulated since [`Self::begin_text`],
    ///   if any.
    fn take_text(&mut self) -> Option<&'a str> {
        self.text
            .take()
            .map(TextBuf::into_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Resolve the textual identifier `text`.
    ///
    /// This copies `text` into the arena only if it is not an alias.
    fn resolve(&self, text: &str) -> ImportResult<NodeId<'a>> {
        let text = text.trim();

        match self.aliases.get(text) {
            Some(id) => Ok(id),
            None if text.is_empty() => Ok(NodeId::NULL),
            None => Ok(self
                .aliases
                .resolve(self.arena.alloc_str(text), &self.namespaces)?),
        }
    }

    fn qualified_name(&self, text: &str) -> ImportResult<QualifiedName<'a>> {
        let parsed = QualifiedName::parse(self.arena.alloc_str(text.trim()));
        let ns = self.namespaces.translate(parsed.ns)?;

        Ok(QualifiedName::new(ns, parsed.name))
    }

    /// Every `Uri` occupies a local index,
    ///   even if it is empty.
    fn end_uri(&mut self) {
        let uri = self.take_text().unwrap_or_default();
        self.namespaces.new_namespace(uri, &mut *self.registry);
    }

    fn end_alias(&mut self) -> ImportResult<()> {
        let target = self.take_text();

        if let (Some(name), Some(target)) = (self.alias.take(), target) {
            // Aliases may not refer to other aliases.
            let id = NodeId::parse(target).translate(&self.namespaces)?;
            self.aliases.insert(name, id);
        }

        Ok(())
    }

    fn begin_node(
        &mut self,
        class: NodeClass,
        attrs: &[Attr],
    ) -> ImportResult<()> {
        let mut node = Node::new(class, NodeId::NULL);

        for Attr { key, value } in attrs {
            let value: &str = value;

            match *key {
                "NodeId" => node.id = self.resolve(value)?,
                "BrowseName" => node.browse_name = self.qualified_name(value)?,
                "SymbolicName" => {
                    node.symbolic_name = self.arena.alloc_nonempty(value.trim())
                }
                "WriteMask" => node.write_mask = parse_or(value, 0),
                "ParentNodeId" => {
                    let parent = self.resolve(value)?;

                    if let Some(instance) = node.instance_mut() {
                        instance.parent = parent;
                    }
                }
                _ => self.class_attr(&mut node.attrs, key, value)?,
            }
        }

        self.node = Some(node);
        Ok(())
    }

    /// Apply an attribute specific to the class of a node.
    ///
    /// Attributes that do not apply to the class are ignored.
    fn class_attr(
        &self,
        attrs: &mut NodeAttrs<'a>,
        key: &str,
        value: &str,
    ) -> ImportResult<()> {
        match (attrs, key) {
            (NodeAttrs::Object(attrs), "EventNotifier") => {
                attrs.event_notifier = parse_or(value, 0)
            }

            (NodeAttrs::ObjectType(attrs), "IsAbstract") => {
                attrs.is_abstract = parse_bool(value)
            }

            (NodeAttrs::Variable(attrs), "DataType") => {
                attrs.datatype = self.datatype(value)?
            }
            (NodeAttrs::Variable(attrs), "ValueRank") => {
                attrs.value_rank = parse_or(value, -1)
            }
            (NodeAttrs::Variable(attrs), "ArrayDimensions") => {
                attrs.array_dimensions = self.arena.alloc_nonempty(value.trim())
            }
            (NodeAttrs::Variable(attrs), "AccessLevel") => {
                attrs.access_level = parse_or(value, 1)
            }
            (NodeAttrs::Variable(attrs), "UserAccessLevel") => {
                attrs.user_access_level = parse_or(value, 1)
            }
            (NodeAttrs::Variable(attrs), "Historizing") => {
                attrs.historizing = parse_bool(value)
            }
            (NodeAttrs::Variable(attrs), "MinimumSamplingInterval") => {
                attrs.minimum_sampling_interval = parse_or(value, 0.0)
            }

            (NodeAttrs::VariableType(attrs), "DataType") => {
                attrs.datatype = self.datatype(value)?
            }
            (NodeAttrs::VariableType(attrs), "ValueRank") => {
                attrs.value_rank = parse_or(value, -1)
            }
            (NodeAttrs::VariableType(attrs), "ArrayDimensions") => {
                attrs.array_dimensions = self.arena.alloc_nonempty(value.trim())
            }
            (NodeAttrs::VariableType(attrs), "IsAbstract") => {
                attrs.is_abstract = parse_bool(value)
            }

            (NodeAttrs::Method(attrs), "Executable") => {
                attrs.executable = parse_bool(value)
            }
            (NodeAttrs::Method(attrs), "UserExecutable") => {
                attrs.user_executable = parse_bool(value)
            }

            (NodeAttrs::DataType(attrs), "IsAbstract") => {
                attrs.is_abstract = parse_bool(value)
            }

            (NodeAttrs::ReferenceType(attrs), "IsAbstract") => {
                attrs.is_abstract = parse_bool(value)
            }
            (NodeAttrs::ReferenceType(attrs), "Symmetric") => {
                attrs.symmetric = parse_bool(value)
            }

            (NodeAttrs::View(attrs), "ContainsNoLoops") => {
                attrs.contains_no_loops = parse_bool(value)
            }
            (NodeAttrs::View(attrs), "EventNotifier") => {
                attrs.event_notifier = parse_or(value, 0)
            }

            _ => (),
        }

        Ok(())
    }

    /// Resolve a `DataType` attribute,
    ///   which defaults to `BaseDataType` when empty.
    fn datatype(&self, text: &str) -> ImportResult<NodeId<'a>> {
        self.resolve(text).map(|id| match id.is_null() {
            true => well_known::BASE_DATA_TYPE,
            false => id,
        })
    }

    fn end_node(&mut self) {
        let Some(node) = self.node.take() else {
            return;
        };

        if node.id.is_null() {
            tracing::warn!(
                class = %node.class(),
                browse_name = %node.browse_name,
                "ignoring node without NodeId"
            );
            return;
        }

        if node.class() == NodeClass::ReferenceType {
            self.classifier.register_reference_type(&node);
        }

        let resolved = !node.refs.has_unknown();
        let nref = self.nodes.push(node);

        match resolved {
            true => self.sort.add_node(nref, self.nodes.get(nref)),
            false => self.pending.push(nref),
        }
    }

    fn begin_localized(&mut self, attrs: &[Attr]) {
        self.locale = attr(attrs, "Locale")
            .and_then(|locale| self.arena.alloc_nonempty(locale.trim()));
        self.begin_text();
    }

    fn end_localized(&mut self) -> LocalizedText<'a> {
        LocalizedText {
            locale: self.locale.take(),
            text: self.take_text().unwrap_or_default(),
        }
    }

    fn begin_reference(&mut self, attrs: &[Attr]) -> ImportResult<()> {
        let ref_type = match attr(attrs, "ReferenceType") {
            Some(text) => self.resolve(text)?,
            None => NodeId::NULL,
        };

        let is_forward = attr(attrs, "IsForward")
            .map(parse_bool)
            .unwrap_or(true);

        self.reference = Some(RefDraft {
            ref_type,
            is_forward,
        });
        self.begin_text();

        Ok(())
    }

    fn end_reference(&mut self) -> ImportResult<()> {
        let target = match self.take_text() {
            Some(text) => self.resolve(text)?,
            None => NodeId::NULL,
        };

        let (Some(draft), Some(node)) = (self.reference.take(), self.node.as_mut())
        else {
            return Ok(());
        };

        let reference = Reference::new(draft.ref_type, target, draft.is_forward);

        let type_definition = reference.is_forward
            && self.classifier.is_type_definition_ref(&reference);

        match node.instance_mut() {
            Some(instance) if type_definition => {
                instance.type_definition = Some(target);
            }
            _ => {
                let bucket = self.classifier.classify(&reference);
                node.refs.attach(reference, bucket);
            }
        }

        self.nodes.finalize_reference(node, &reference);
        Ok(())
    }

    fn begin_value(&mut self, pos: usize) {
        if let Some(node) = self.node.as_ref() {
            self.value = Some(ValueCapture {
                handle: self.values.new_value(node),
                start: pos,
            });
        }

        // Text directly within `<Value>` is not meaningful.
        self.text = None;
    }

    fn end_value(&mut self, pos: usize) {
        self.text = None;

        let Some(capture) = self.value.take() else {
            return;
        };

        self.values.finish(capture.handle);

        // Exclude the closing `</Value>` tag.
        let content = self.input.get(capture.start..pos).unwrap_or_default();
        let raw = match memrchr(b'<', content.as_bytes()) {
            Some(end) => &content[..end],
            None => content,
        };

        let value = Some(NodeValue {
            handle: capture.handle,
            raw: self.arena.alloc_str(raw),
        });

        match self.node.as_mut().map(|node| &mut node.attrs) {
            Some(NodeAttrs::Variable(attrs)) => attrs.value = value,
            Some(NodeAttrs::VariableType(attrs)) => attrs.value = value,
            _ => (),
        }
    }

    fn begin_definition(&mut self, attrs: &[Attr]) {
        self.definition = Some(DataTypeDefinition {
            name: attr(attrs, "Name")
                .and_then(|name| self.arena.alloc_nonempty(name.trim())),
            fields: Vec::new(),
            is_union: attr(attrs, "IsUnion").map(parse_bool).unwrap_or(false),
            is_option_set: attr(attrs, "IsOptionSet")
                .map(parse_bool)
                .unwrap_or(false),
            is_enum: false,
        });
    }

    fn begin_field(&mut self, attrs: &[Attr]) -> ImportResult<()> {
        let mut field = DataTypeField {
            name: "",
            datatype: well_known::BASE_DATA_TYPE,
            value_rank: -1,
            array_dimensions: None,
            is_optional: false,
            value: None,
        };

        for Attr { key, value } in attrs {
            let value: &str = value;

            match *key {
                "Name" => field.name = self.arena.alloc_str(value.trim()),
                "DataType" => field.datatype = self.datatype(value)?,
                "ValueRank" => field.value_rank = parse_or(value, -1),
                "ArrayDimensions" => {
                    field.array_dimensions =
                        self.arena.alloc_nonempty(value.trim())
                }
                "IsOptional" => field.is_optional = parse_bool(value),
                "Value" => field.value = value.trim().parse().ok(),
                _ => (),
            }
        }

        if let Some(definition) = self.definition.as_mut() {
            definition.is_enum |= field.value.is_some();
            definition.fields.push(field);
        }

        Ok(())
    }

    fn end_definition(&mut self) {
        let definition = self.definition.take();

        if let Some(NodeAttrs::DataType(attrs)) =
            self.node.as_mut().map(|node| &mut node.attrs)
        {
            attrs.definition = definition;
        }
    }

    /// Retry classification of the references of nodes that could not be
    ///   sorted when they closed,
    ///     now that every reference type of the document is known.
    fn finish(mut self) -> ImportResult<Document<'a>> {
        let mut passes = 0;

        while !self.pending.is_empty() && passes < global::MAX_RESOLVE_PASSES {
            passes += 1;

            let before = self.pending.len();
            let (nodes, sort, classifier) =
                (&mut self.nodes, &mut self.sort, &self.classifier);

            self.pending.retain(|&nref| {
                let node = nodes.get_mut(nref);

                match classifier.resolve_deferred(node) {
                    true => {
                        sort.add_node(nref, node);
                        false
                    }
                    false => true,
                }
            });

            if self.pending.len() == before {
                break;
            }
        }

        if let Some(&nref) = self.pending.first() {
            let node = self.nodes.get(nref);

            return Err(ImportError::UnresolvedReference {
                node: node.id.to_string(),
                references: node
                    .refs
                    .unknown
                    .iter()
                    .map(|r| r.ref_type.to_string())
                    .collect(),
            });
        }

        tracing::debug!(
            nodes = self.nodes.len(),
            aliases = self.aliases.len(),
            namespaces = self.namespaces.len(),
            encodings = self.nodes.encodings().len(),
            "parsed document"
        );

        Ok(Document {
            nodes: self.nodes,
            namespaces: self.namespaces,
            aliases: self.aliases,
            classifier: self.classifier,
            sort: self.sort,
        })
    }
}

fn parse_or<T: FromStr>(text: &str, default: T) -> T {
    text.trim().parse().unwrap_or(default)
}

fn parse_bool(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}
