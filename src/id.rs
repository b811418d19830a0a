// Node identifiers and aliases
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

//! Node identifiers and the alias table.
//!
//! A [`NodeId`] pairs a namespace index with an identifier token.
//! The identifier token is kept in its textual form
//!   (e.g. `i=85`, `s=Pump`, `g=...`),
//!     since the loader only ever compares identifiers and never
//!     interprets them.
//!
//! Identifiers appear in a UANodeSet document in the form
//!   `ns=<index>;<identifier>`,
//!     where the namespace prefix is omitted for namespace `0`.
//! The namespace index of a document is _local_ to that document and is
//!   translated into the _global_ index of the backend through the
//!   [`NamespaceTable`](crate::ns::NamespaceTable) the moment it is parsed.
//!
//! Documents may also declare short aliases for identifiers
//!   (`<Alias Alias="HasSubtype">i=45</Alias>`);
//!     see [`AliasTable`].

use crate::global::NamespaceIndex;
use crate::ns::{NamespaceError, NamespaceTable};
use fxhash::FxHashMap;
use memchr::memchr;
use std::fmt::Display;

/// Identifier of a node.
///
/// Ordering compares the namespace index numerically first and then the
///   identifier text lexicographically;
///     this is the key used for every ordered lookup in the loader.
///
/// The identifier text is borrowed,
///   usually from an [`Arena`](crate::arena::Arena),
///   making this type [`Copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId<'a> {
    ns: NamespaceIndex,
    id: &'a str,
}

impl<'a> NodeId<'a> {
    /// The null identifier,
    ///   representing the absence of an identifier.
    pub const NULL: NodeId<'static> = NodeId { ns: 0, id: "" };

    pub const fn new(ns: NamespaceIndex, id: &'a str) -> Self {
        Self { ns, id }
    }

    pub fn ns(&self) -> NamespaceIndex {
        self.ns
    }

    pub fn id(&self) -> &'a str {
        self.id
    }

    pub fn is_null(&self) -> bool {
        self.ns == 0 && self.id.is_empty()
    }

    /// Whether this identifier lives in the base namespace.
    pub fn is_base(&self) -> bool {
        self.ns == 0
    }

    /// Parse the textual form of an identifier without any namespace
    ///   translation.
    ///
    /// An `ns=` prefix that cannot be parsed as a namespace index yields
    ///   [`NodeId::NULL`],
    ///     as does empty text.
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();

        match text.strip_prefix("ns=") {
            None if text.is_empty() => NodeId::NULL,
            None => Self::new(0, text),
            Some(rest) => match memchr(b';', rest.as_bytes()) {
                Some(pos) => rest[..pos]
                    .parse()
                    .map(|ns| Self::new(ns, &rest[pos + 1..]))
                    .unwrap_or(NodeId::NULL),
                None => NodeId::NULL,
            },
        }
    }

    /// Replace the namespace index with its global equivalent.
    pub fn translate(
        self,
        namespaces: &NamespaceTable,
    ) -> Result<Self, NamespaceError> {
        namespaces
            .translate(self.ns)
            .map(|ns| Self::new(ns, self.id))
    }
}

impl Default for NodeId<'_> {
    fn default() -> Self {
        NodeId::NULL
    }
}

impl Display for NodeId<'_> {
    /// Render in the same textual form accepted by [`NodeId::parse`].
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ns {
            0 => write!(f, "{}", self.id),
            ns => write!(f, "ns={};{}", ns, self.id),
        }
    }
}

/// Identifiers in the base namespace that the loader must recognize.
pub mod well_known {
    use super::NodeId;

    macro_rules! well_known_ids {
        ($($(#[$attr:meta])* $name:ident = $id:literal,)*) => {
            $(
                $(#[$attr])*
                pub const $name: NodeId<'static> = NodeId::new(0, $id);
            )*
        };
    }

    well_known_ids! {
        /// Abstract root of all data types.
        BASE_DATA_TYPE = "i=24",
        STRUCTURE = "i=22",
        ENUMERATION = "i=29",
        OPTION_SET = "i=12755",
        UNION = "i=12756",
        /// Reference from a data type to its encodings.
        HAS_ENCODING = "i=38",
        HAS_TYPE_DEFINITION = "i=40",
        HAS_SUBTYPE = "i=45",
    }

    /// BrowseName of the binary encoding node of a data type.
    pub const DEFAULT_BINARY: &str = "Default Binary";
}

/// Alias table mapping short names to identifiers.
///
/// Aliases are registered in the order they appear in the document and
///   are never removed.
/// Registering an alias a second time replaces its previous binding.
///
/// The identifier bound to an alias has already been translated into
///   global namespace terms.
#[derive(Debug, Default)]
pub struct AliasTable<'a> {
    aliases: FxHashMap<&'a str, NodeId<'a>>,
}

impl<'a> AliasTable<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Bind `name` to the identifier `id`.
    pub fn insert(&mut self, name: &'a str, id: NodeId<'a>) {
        self.aliases.insert(name, id);
    }

    pub fn get(&self, name: &str) -> Option<NodeId<'a>> {
        self.aliases.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Resolve textual identifier `text` into a global [`NodeId`].
    ///
    /// If `text` names a known alias,
    ///   the bound identifier is returned.
    /// Otherwise `text` is parsed as a literal identifier and its
    ///   namespace index is translated through `namespaces`.
    /// Empty or unparseable text yields [`NodeId::NULL`],
    ///   which callers must treat as an absent identifier.
    ///
    /// Errors
    /// ======
    /// - [`NamespaceError::OutOfRange`] if `text` references a namespace
    ///   index that the document never declared.
    pub fn resolve(
        &self,
        text: &'a str,
        namespaces: &NamespaceTable,
    ) -> Result<NodeId<'a>, NamespaceError> {
        let text = text.trim();

        if let Some(id) = self.get(text) {
            return Ok(id);
        }

        match NodeId::parse(text) {
            id if id.is_null() => Ok(NodeId::NULL),
            id => id.translate(namespaces),
        }
    }
}
