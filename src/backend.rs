// Node emission backends
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

//! Receivers of loaded nodes.
//!
//! A [`Backend`] is the runtime into which the [loader](crate::ld)
//!   instantiates nodes.
//! Nodes are delivered in an order in which the parent and supertype of
//!   every node precede it;
//!     other prerequisites are not ordered,
//!       and so a backend may reject a node
//!       (for example because its type definition does not yet exist),
//!       after which the loader will offer it again.
//!
//! [`AddressSpace`] is an in-memory backend that records every node it
//!   accepts.
//! Nodes of the base namespace are assumed to already exist in any
//!   backend.
//!
//! A backend is not synchronized;
//!   it must not be shared by concurrent imports.

use crate::global::NamespaceIndex;
use crate::id::NodeId;
use crate::node::Node;
use crate::ns::NamespaceRegistry;
use fxhash::FxHashMap;
use std::error::Error;
use std::fmt::{self, Display};

/// Runtime receiving nodes in emission order.
pub trait Backend<'a>: NamespaceRegistry {
    /// Reason for rejecting a node.
    type Error: Display;

    /// Instantiate `node`.
    ///
    /// A rejected node may be offered again after other nodes have been
    ///   added.
    fn add_node(&mut self, node: &Node<'a>) -> Result<(), Self::Error>;
}

/// In-memory address space.
///
/// Namespace URIs are deduplicated,
///   so that documents imported in sequence that declare the same URI
///   share a namespace index.
#[derive(Debug)]
pub struct AddressSpace<'a> {
    namespaces: Vec<String>,
    nodes: FxHashMap<NodeId<'a>, Node<'a>>,

    /// Identifiers in the order their nodes were accepted.
    order: Vec<NodeId<'a>>,
}

impl<'a> AddressSpace<'a> {
    pub fn new() -> Self {
        Self {
            namespaces: vec![crate::global::BASE_NAMESPACE_URI.into()],
            nodes: Default::default(),
            order: Vec::new(),
        }
    }

    pub fn get(&self, id: NodeId<'a>) -> Option<&Node<'a>> {
        self.nodes.get(&id)
    }

    /// Whether a node `id` exists.
    ///
    /// Every node of the base namespace is assumed to exist.
    pub fn contains(&self, id: NodeId<'_>) -> bool {
        id.is_base() || self.nodes.contains_key(&id)
    }

    /// URI of the namespace `index`.
    pub fn namespace_uri(&self, index: NamespaceIndex) -> Option<&str> {
        self.namespaces.get(index as usize).map(String::as_str)
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Nodes in the order they were accepted.
    pub fn iter(&self) -> impl Iterator<Item = &Node<'a>> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First prerequisite of `node` that does not yet exist.
    fn missing_prerequisite(&self, node: &Node<'a>) -> Option<AddNodeError> {
        let node_id = || node.id.to_string();

        let parent = node
            .refs
            .parents()
            .map(|r| r.target)
            .chain(node.parent())
            .find(|&parent| !self.contains(parent));

        if let Some(parent) = parent {
            return Some(AddNodeError::MissingParent {
                node: node_id(),
                parent: parent.to_string(),
            });
        }

        node.type_definition()
            .filter(|&typedef| !self.contains(typedef))
            .map(|typedef| AddNodeError::MissingTypeDefinition {
                node: node_id(),
                type_definition: typedef.to_string(),
            })
    }
}

impl Default for AddressSpace<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceRegistry for AddressSpace<'_> {
    fn add_namespace(&mut self, uri: &str) -> NamespaceIndex {
        match self.namespaces.iter().position(|known| known == uri) {
            Some(index) => index as NamespaceIndex,
            None => {
                self.namespaces.push(uri.into());
                (self.namespaces.len() - 1) as NamespaceIndex
            }
        }
    }
}

impl<'a> Backend<'a> for AddressSpace<'a> {
    type Error = AddNodeError;

    fn add_node(&mut self, node: &Node<'a>) -> Result<(), AddNodeError> {
        if self.nodes.contains_key(&node.id) {
            return Err(AddNodeError::Duplicate(node.id.to_string()));
        }

        if let Some(err) = self.missing_prerequisite(node) {
            return Err(err);
        }

        self.order.push(node.id);
        self.nodes.insert(node.id, node.clone());

        Ok(())
    }
}

/// Rejection of a node by [`AddressSpace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddNodeError {
    /// A node with the same identifier already exists.
    Duplicate(String),

    /// The parent of the node does not exist.
    MissingParent { node: String, parent: String },

    /// The type definition of the node does not exist.
    MissingTypeDefinition {
        node: String,
        type_definition: String,
    },
}

impl Display for AddNodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Duplicate(node) => write!(f, "node {node} already exists"),
            Self::MissingParent { node, parent } => {
                write!(f, "parent {parent} of node {node} does not exist")
            }
            Self::MissingTypeDefinition {
                node,
                type_definition,
            } => write!(
                f,
                "type definition {type_definition} of node {node} does not exist"
            ),
        }
    }
}

impl Error for AddNodeError {}
