// Node and reference graph model
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

//! In-memory representation of a UANodeSet document.
//!
//! A [`Node`] holds the attributes common to every node class along with a
//!   class-specific payload ([`NodeAttrs`]).
//! References are held on the node that declares them and are partitioned
//!   into three buckets ([`RefBucket`]):
//!
//!   - _hierarchical_ references impose a creation order;
//!   - _non-hierarchical_ references are ignored for ordering; and
//!   - _unknown_ references are those whose reference type could not yet
//!       be classified
//!         (see [`crate::refs`]).
//!
//! Nodes are owned by a [`NodeSet`] and addressed by [`NodeRef`],
//!   which remains stable for the lifetime of the document.
//! All text is borrowed from an [`Arena`](crate::arena::Arena).

use crate::global::NamespaceIndex;
use crate::id::{well_known, NodeId};
use crate::value::ValueHandle;
use std::fmt::Display;

/// Class of a node.
///
/// The declaration order of the variants is the order in which classes
///   are emitted to a backend;
///     see [`NodeClass::EMIT_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeClass {
    ReferenceType,
    ObjectType,
    Object,
    Method,
    DataType,
    VariableType,
    Variable,
    View,
}

impl NodeClass {
    /// Order in which node classes are emitted.
    ///
    /// Reference types come first so that reference classification is
    ///   available to the backend before any node uses them.
    /// Within a class,
    ///   the dependency order of the sort is preserved.
    pub const EMIT_ORDER: [NodeClass; 8] = [
        Self::ReferenceType,
        Self::ObjectType,
        Self::Object,
        Self::Method,
        Self::DataType,
        Self::VariableType,
        Self::Variable,
        Self::View,
    ];

    /// Determine the node class from the local name of a UANodeSet
    ///   element.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "UAObject" => Some(Self::Object),
            "UAObjectType" => Some(Self::ObjectType),
            "UAVariable" => Some(Self::Variable),
            "UAVariableType" => Some(Self::VariableType),
            "UAMethod" => Some(Self::Method),
            "UADataType" => Some(Self::DataType),
            "UAReferenceType" => Some(Self::ReferenceType),
            "UAView" => Some(Self::View),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReferenceType => "ReferenceType",
            Self::ObjectType => "ObjectType",
            Self::Object => "Object",
            Self::Method => "Method",
            Self::DataType => "DataType",
            Self::VariableType => "VariableType",
            Self::Variable => "Variable",
            Self::View => "View",
        }
    }
}

impl Display for NodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name qualified by a namespace index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualifiedName<'a> {
    pub ns: NamespaceIndex,
    pub name: &'a str,
}

impl<'a> QualifiedName<'a> {
    pub fn new(ns: NamespaceIndex, name: &'a str) -> Self {
        Self { ns, name }
    }

    /// Split the textual form `n:Name` into its local namespace index and
    ///   name.
    ///
    /// Text without a numeric prefix lives in namespace `0`,
    ///   including names that happen to contain a colon.
    pub fn parse(text: &'a str) -> Self {
        text.split_once(':')
            .and_then(|(prefix, name)| {
                prefix.parse().ok().map(|ns| Self::new(ns, name))
            })
            .unwrap_or(Self::new(0, text))
    }
}

impl Display for QualifiedName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ns {
            0 => f.write_str(self.name),
            ns => write!(f, "{}:{}", ns, self.name),
        }
    }
}

/// Text with an optional locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalizedText<'a> {
    pub locale: Option<&'a str>,
    pub text: &'a str,
}

/// Which of the three reference lists of a node a reference belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefBucket {
    Hierarchical,
    NonHierarchical,
    Unknown,
}

/// Typed, directed edge declared by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub is_forward: bool,
    pub ref_type: NodeId<'a>,
    pub target: NodeId<'a>,
}

impl<'a> Reference<'a> {
    pub fn new(
        ref_type: NodeId<'a>,
        target: NodeId<'a>,
        is_forward: bool,
    ) -> Self {
        Self {
            is_forward,
            ref_type,
            target,
        }
    }

    pub fn is_inverse(&self) -> bool {
        !self.is_forward
    }
}

/// Reference lists of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References<'a> {
    pub hierarchical: Vec<Reference<'a>>,
    pub non_hierarchical: Vec<Reference<'a>>,
    pub unknown: Vec<Reference<'a>>,
}

impl<'a> References<'a> {
    pub fn attach(&mut self, reference: Reference<'a>, bucket: RefBucket) {
        self.bucket_mut(bucket).push(reference)
    }

    pub fn bucket(&self, bucket: RefBucket) -> &[Reference<'a>] {
        match bucket {
            RefBucket::Hierarchical => &self.hierarchical,
            RefBucket::NonHierarchical => &self.non_hierarchical,
            RefBucket::Unknown => &self.unknown,
        }
    }

    fn bucket_mut(&mut self, bucket: RefBucket) -> &mut Vec<Reference<'a>> {
        match bucket {
            RefBucket::Hierarchical => &mut self.hierarchical,
            RefBucket::NonHierarchical => &mut self.non_hierarchical,
            RefBucket::Unknown => &mut self.unknown,
        }
    }

    /// Whether any reference is still awaiting classification.
    pub fn has_unknown(&self) -> bool {
        !self.unknown.is_empty()
    }

    /// Inverse hierarchical references,
    ///   whose targets must exist before the declaring node.
    pub fn parents(&self) -> impl Iterator<Item = &Reference<'a>> {
        self.hierarchical.iter().filter(|r| r.is_inverse())
    }

    /// All references regardless of bucket.
    pub fn iter(&self) -> impl Iterator<Item = &Reference<'a>> {
        self.hierarchical
            .iter()
            .chain(self.non_hierarchical.iter())
            .chain(self.unknown.iter())
    }

    pub fn len(&self) -> usize {
        self.hierarchical.len()
            + self.non_hierarchical.len()
            + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Attributes shared by instance nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instance<'a> {
    /// Value of `ParentNodeId`,
    ///   or [`NodeId::NULL`] if absent.
    pub parent: NodeId<'a>,

    /// Target of the `HasTypeDefinition` reference,
    ///   of which an instance has at most one.
    pub type_definition: Option<NodeId<'a>>,
}

/// Value captured from a `<Value>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeValue<'a> {
    /// Handle assigned by the [`ValueHandler`](crate::value::ValueHandler)
    ///   that received the value's element events.
    pub handle: ValueHandle,

    /// Verbatim XML content of the `<Value>` element.
    pub raw: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttrs<'a> {
    pub instance: Instance<'a>,
    pub event_notifier: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectTypeAttrs {
    pub is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableAttrs<'a> {
    pub instance: Instance<'a>,
    pub datatype: NodeId<'a>,
    pub value_rank: i32,
    pub array_dimensions: Option<&'a str>,
    pub value: Option<NodeValue<'a>>,
    pub access_level: u8,
    pub user_access_level: u8,
    pub historizing: bool,
    pub minimum_sampling_interval: f64,
}

impl Default for VariableAttrs<'_> {
    fn default() -> Self {
        Self {
            instance: Default::default(),
            datatype: well_known::BASE_DATA_TYPE,
            value_rank: -1,
            array_dimensions: None,
            value: None,
            access_level: 1,
            user_access_level: 1,
            historizing: false,
            minimum_sampling_interval: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableTypeAttrs<'a> {
    pub datatype: NodeId<'a>,
    pub value_rank: i32,
    pub array_dimensions: Option<&'a str>,
    pub value: Option<NodeValue<'a>>,
    pub is_abstract: bool,
}

impl Default for VariableTypeAttrs<'_> {
    fn default() -> Self {
        Self {
            datatype: well_known::BASE_DATA_TYPE,
            value_rank: -1,
            array_dimensions: None,
            value: None,
            is_abstract: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAttrs<'a> {
    pub instance: Instance<'a>,
    pub executable: bool,
    pub user_executable: bool,
}

impl Default for MethodAttrs<'_> {
    fn default() -> Self {
        Self {
            instance: Default::default(),
            executable: true,
            user_executable: true,
        }
    }
}

/// One field of a data type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeField<'a> {
    pub name: &'a str,
    pub datatype: NodeId<'a>,
    pub value_rank: i32,
    pub array_dimensions: Option<&'a str>,
    pub is_optional: bool,

    /// Literal value of an enumeration field.
    pub value: Option<i64>,
}

impl<'a> DataTypeField<'a> {
    /// Whether the field holds an array of its data type.
    pub fn is_array(&self) -> bool {
        self.value_rank >= 0
    }
}

/// Definition of the members of a structure, union, enumeration, or
///   option set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTypeDefinition<'a> {
    pub name: Option<&'a str>,
    pub fields: Vec<DataTypeField<'a>>,
    pub is_union: bool,
    pub is_option_set: bool,

    /// Whether any field carries a literal value.
    pub is_enum: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTypeAttrs<'a> {
    pub is_abstract: bool,
    pub definition: Option<DataTypeDefinition<'a>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTypeAttrs<'a> {
    pub inverse_name: Option<LocalizedText<'a>>,
    pub symmetric: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewAttrs<'a> {
    pub instance: Instance<'a>,
    pub contains_no_loops: bool,
    pub event_notifier: u8,
}

/// Class-specific attributes of a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAttrs<'a> {
    Object(ObjectAttrs<'a>),
    ObjectType(ObjectTypeAttrs),
    Variable(VariableAttrs<'a>),
    VariableType(VariableTypeAttrs<'a>),
    Method(MethodAttrs<'a>),
    DataType(DataTypeAttrs<'a>),
    ReferenceType(ReferenceTypeAttrs<'a>),
    View(ViewAttrs<'a>),
}

impl<'a> NodeAttrs<'a> {
    /// Default attributes for a node of class `class`.
    pub fn for_class(class: NodeClass) -> Self {
        match class {
            NodeClass::Object => Self::Object(Default::default()),
            NodeClass::ObjectType => Self::ObjectType(Default::default()),
            NodeClass::Variable => Self::Variable(Default::default()),
            NodeClass::VariableType => Self::VariableType(Default::default()),
            NodeClass::Method => Self::Method(Default::default()),
            NodeClass::DataType => Self::DataType(Default::default()),
            NodeClass::ReferenceType => {
                Self::ReferenceType(Default::default())
            }
            NodeClass::View => Self::View(Default::default()),
        }
    }

    pub fn class(&self) -> NodeClass {
        match self {
            Self::Object(_) => NodeClass::Object,
            Self::ObjectType(_) => NodeClass::ObjectType,
            Self::Variable(_) => NodeClass::Variable,
            Self::VariableType(_) => NodeClass::VariableType,
            Self::Method(_) => NodeClass::Method,
            Self::DataType(_) => NodeClass::DataType,
            Self::ReferenceType(_) => NodeClass::ReferenceType,
            Self::View(_) => NodeClass::View,
        }
    }
}

/// A node of the address space.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<'a> {
    pub id: NodeId<'a>,
    pub browse_name: QualifiedName<'a>,
    pub display_name: Option<LocalizedText<'a>>,
    pub description: Option<LocalizedText<'a>>,
    pub symbolic_name: Option<&'a str>,
    pub write_mask: u32,
    pub refs: References<'a>,
    pub attrs: NodeAttrs<'a>,
}

impl<'a> Node<'a> {
    pub fn new(class: NodeClass, id: NodeId<'a>) -> Self {
        Self {
            id,
            browse_name: Default::default(),
            display_name: None,
            description: None,
            symbolic_name: None,
            write_mask: 0,
            refs: Default::default(),
            attrs: NodeAttrs::for_class(class),
        }
    }

    pub fn class(&self) -> NodeClass {
        self.attrs.class()
    }

    /// Whether this node is an instance
    ///   (Object, Variable, Method, or View)
    ///   rather than a type.
    pub fn is_instance(&self) -> bool {
        self.instance().is_some()
    }

    pub fn instance(&self) -> Option<&Instance<'a>> {
        match &self.attrs {
            NodeAttrs::Object(attrs) => Some(&attrs.instance),
            NodeAttrs::Variable(attrs) => Some(&attrs.instance),
            NodeAttrs::Method(attrs) => Some(&attrs.instance),
            NodeAttrs::View(attrs) => Some(&attrs.instance),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self) -> Option<&mut Instance<'a>> {
        match &mut self.attrs {
            NodeAttrs::Object(attrs) => Some(&mut attrs.instance),
            NodeAttrs::Variable(attrs) => Some(&mut attrs.instance),
            NodeAttrs::Method(attrs) => Some(&mut attrs.instance),
            NodeAttrs::View(attrs) => Some(&mut attrs.instance),
            _ => None,
        }
    }

    /// Value of `ParentNodeId` for instance nodes.
    pub fn parent(&self) -> Option<NodeId<'a>> {
        self.instance()
            .map(|instance| instance.parent)
            .filter(|parent| !parent.is_null())
    }

    pub fn type_definition(&self) -> Option<NodeId<'a>> {
        self.instance().and_then(|instance| instance.type_definition)
    }

    /// Data type of the value of a Variable or VariableType.
    pub fn datatype(&self) -> Option<NodeId<'a>> {
        match &self.attrs {
            NodeAttrs::Variable(attrs) => Some(attrs.datatype),
            NodeAttrs::VariableType(attrs) => Some(attrs.datatype),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&NodeValue<'a>> {
        match &self.attrs {
            NodeAttrs::Variable(attrs) => attrs.value.as_ref(),
            NodeAttrs::VariableType(attrs) => attrs.value.as_ref(),
            _ => None,
        }
    }

    pub fn definition(&self) -> Option<&DataTypeDefinition<'a>> {
        match &self.attrs {
            NodeAttrs::DataType(attrs) => attrs.definition.as_ref(),
            _ => None,
        }
    }

    pub fn is_abstract(&self) -> bool {
        match &self.attrs {
            NodeAttrs::ObjectType(attrs) => attrs.is_abstract,
            NodeAttrs::VariableType(attrs) => attrs.is_abstract,
            NodeAttrs::DataType(attrs) => attrs.is_abstract,
            NodeAttrs::ReferenceType(attrs) => attrs.is_abstract,
            _ => false,
        }
    }

    /// Target of the first inverse `HasSubtype` reference,
    ///   which is the supertype of a type node.
    pub fn supertype(&self) -> Option<NodeId<'a>> {
        self.refs
            .iter()
            .find(|r| r.is_inverse() && r.ref_type == well_known::HAS_SUBTYPE)
            .map(|r| r.target)
    }
}

/// Stable handle of a node within a [`NodeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(usize);

impl NodeRef {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Link between a data type and its `Default Binary` encoding node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingLink<'a> {
    pub encoding: NodeId<'a>,
    pub datatype: NodeId<'a>,
}

/// Nodes of one document.
///
/// Besides the nodes themselves,
///   the document records the bidirectional link between each data type
///   and its binary encoding
///     (see [`NodeSet::finalize_reference`]).
#[derive(Debug, Default)]
pub struct NodeSet<'a> {
    nodes: Vec<Node<'a>>,
    encodings: Vec<EncodingLink<'a>>,
}

impl<'a> NodeSet<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Take ownership of a completed node.
    pub fn push(&mut self, node: Node<'a>) -> NodeRef {
        self.nodes.push(node);
        NodeRef(self.nodes.len() - 1)
    }

    pub fn get(&self, nref: NodeRef) -> &Node<'a> {
        &self.nodes[nref.0]
    }

    pub fn get_mut(&mut self, nref: NodeRef) -> &mut Node<'a> {
        &mut self.nodes[nref.0]
    }

    /// Linear search by identifier.
    pub fn find(&self, id: NodeId<'_>) -> Option<&Node<'a>> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &Node<'a>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeRef(i), node))
    }

    /// Perform bookkeeping for a reference whose target has just been
    ///   resolved on `node`.
    ///
    /// An inverse `HasEncoding` reference declared by a node whose
    ///   BrowseName is `Default Binary` names the data type that the node
    ///   encodes;
    ///     that link is recorded for [`NodeSet::encoding_of`] and
    ///     [`NodeSet::datatype_of`].
    pub fn finalize_reference(
        &mut self,
        node: &Node<'a>,
        reference: &Reference<'a>,
    ) {
        if reference.ref_type == well_known::HAS_ENCODING
            && reference.is_inverse()
            && node.browse_name.name == well_known::DEFAULT_BINARY
        {
            self.encodings.push(EncodingLink {
                encoding: node.id,
                datatype: reference.target,
            });
        }
    }

    /// Binary encoding node of the data type `datatype`.
    pub fn encoding_of(&self, datatype: NodeId<'_>) -> Option<NodeId<'a>> {
        self.encodings
            .iter()
            .find(|link| link.datatype == datatype)
            .map(|link| link.encoding)
    }

    /// Data type encoded by the encoding node `encoding`.
    pub fn datatype_of(&self, encoding: NodeId<'_>) -> Option<NodeId<'a>> {
        self.encodings
            .iter()
            .find(|link| link.encoding == encoding)
            .map(|link| link.datatype)
    }

    pub fn encodings(&self) -> &[EncodingLink<'a>] {
        &self.encodings
    }
}

#[cfg(test)]
mod test;
