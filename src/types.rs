// Native layout of custom data types
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

//! Native in-memory layout of custom data types.
//!
//! Each DataType node emitted to a backend is [registered](TypeRegistry::register)
//!   with a [`TypeRegistry`],
//!     producing a [`TypeDescriptor`] whose layout is not yet known.
//! Once every DataType of a document has been registered,
//!   [`TypeRegistry::finalize`] computes the layout of the batch:
//!     the size and alignment of each type and the padding preceding each
//!     of its members,
//!       following the layout rules of a `#[repr(C)]` structure.
//!
//! The layout of a type depends on the layout of the types of its
//!   members,
//!     which may be declared in any order,
//!   and on the layout of its supertype.
//! Layout is therefore computed as a fixed point:
//!   each pass lays out every type whose dependencies have all been laid
//!   out,
//!     until a pass makes no progress.
//!
//! Member storage
//! ==============
//! - A scalar member is stored inline with the size and alignment of its
//!     type.
//! - An array member is stored as a length (`usize`) followed by a
//!     pointer to its elements.
//! - An optional scalar member is stored as a pointer,
//!     which is null when the member is absent.
//!
//! A structure with an array or optional member is never pointer-free.
//!
//! A subtype of a custom structure begins with a verbatim copy of its
//!   supertype's members;
//!     its own members begin at the supertype's size.
//!
//! A union is stored as a `u32` discriminant followed by storage for its
//!   largest member.
//! Every member of a union begins at the same offset.
//!
//! Errors
//! ======
//! Layout problems do not fail an import.
//! They are returned by [`TypeRegistry::finalize`] as [`LayoutError`]s,
//!   and the affected types remain [unsized](TypeDescriptor::is_sized):
//!
//! - [`LayoutError::UnknownParentType`] if the supertype of a data type
//!     is neither built-in nor a registered custom type;
//! - [`LayoutError::UnresolvableMemberType`] if the type of a member is
//!     neither built-in, nor custom, nor abstract; and
//! - [`LayoutError::CyclicTypeDependency`] if a type contains itself,
//!     directly or indirectly,
//!       or depends on such a type.

pub mod builtin;

use crate::id::{well_known, NodeId};
use crate::node::{DataTypeDefinition, Node, NodeSet};
use builtin::BuiltinType;
use std::{error::Error, fmt::Display};

/// Kind of a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A built-in type,
    ///   or a subtype of one that shares its representation.
    Builtin(BuiltinType),
    Enum,
    Structure,

    /// A structure with at least one optional member.
    OptionalStructure,
    Union,
}

impl Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(ty) => Display::fmt(ty, f),
            Self::Enum => f.write_str("Enum"),
            Self::Structure => f.write_str("Structure"),
            Self::OptionalStructure => f.write_str("OptionalStructure"),
            Self::Union => f.write_str("Union"),
        }
    }
}

/// Resolved type of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType<'a> {
    Builtin(BuiltinType),
    Custom(NodeId<'a>),
}

/// Member of a structure or union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMember<'a> {
    pub name: &'a str,

    /// Data type as declared by the definition field.
    pub declared_type: NodeId<'a>,

    /// Type that provides the member's storage,
    ///   or [`None`] if not (yet) resolved.
    pub member_type: Option<MemberType<'a>>,
    pub is_array: bool,
    pub is_optional: bool,

    /// Padding bytes preceding this member.
    pub padding: usize,
}

/// Native layout of a data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor<'a> {
    pub type_id: NodeId<'a>,
    pub type_name: &'a str,
    pub binary_encoding_id: Option<NodeId<'a>>,
    pub mem_size: usize,
    pub align: usize,
    pub kind: TypeKind,
    pub pointer_free: bool,
    pub overlayable: bool,
    pub members: Vec<TypeMember<'a>>,
    sized: bool,
}

impl<'a> TypeDescriptor<'a> {
    fn new(node: &Node<'a>, kind: TypeKind) -> Self {
        Self {
            type_id: node.id,
            type_name: node.browse_name.name,
            binary_encoding_id: None,
            mem_size: 0,
            align: 1,
            kind,
            pointer_free: true,
            overlayable: false,
            members: Vec::new(),
            sized: false,
        }
    }

    /// Whether the layout of this type has been computed.
    pub fn is_sized(&self) -> bool {
        self.sized
    }

    /// Byte offset of each member from the start of the type.
    ///
    /// Offsets are derived from the padding of each member;
    ///   they are meaningful only once the type [is sized](Self::is_sized).
    pub fn member_offsets(&self, registry: &TypeRegistry) -> Vec<usize> {
        if self.kind == TypeKind::Union {
            return self
                .members
                .iter()
                .map(|m| UNION_SWITCH_SIZE + m.padding)
                .collect();
        }

        let mut offset = 0;

        self.members
            .iter()
            .map(|m| {
                offset += m.padding;
                let at = offset;
                offset += registry
                    .member_storage(m)
                    .map(|s| s.size)
                    .unwrap_or_default();
                at
            })
            .collect()
    }

    fn storage(&self) -> Option<Storage> {
        self.sized.then_some(Storage {
            size: self.mem_size,
            align: self.align,
            pointer_free: self.pointer_free,
            overlayable: self.overlayable,
        })
    }
}

/// How a data type is derived from its supertype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Basis<'a> {
    /// Laid out from members,
    ///   prefixed by those of a custom supertype if present.
    Struct(Option<NodeId<'a>>),
    Union,

    /// Shares the layout of a custom supertype.
    Copy(NodeId<'a>),

    /// Layout is already known.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending<'a> {
    desc: TypeDescriptor<'a>,
    basis: Basis<'a>,
}

/// Size and alignment of stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Storage {
    size: usize,
    align: usize,
    pointer_free: bool,
    overlayable: bool,
}

impl Storage {
    const WORD: Self = Self {
        size: std::mem::size_of::<usize>(),
        align: std::mem::align_of::<usize>(),
        pointer_free: false,
        overlayable: false,
    };

    fn builtin(ty: BuiltinType) -> Self {
        Self {
            size: ty.size(),
            align: ty.align(),
            pointer_free: ty.is_pointer_free(),
            overlayable: ty.is_overlayable(),
        }
    }
}

/// Size of the discriminant of a union.
const UNION_SWITCH_SIZE: usize = std::mem::size_of::<u32>();

fn align_up(offset: usize, align: usize) -> usize {
    match offset % align {
        0 => offset,
        rem => offset + (align - rem),
    }
}

/// Registry of custom data type layouts.
///
/// Types are registered in batches;
///   each call to [`TypeRegistry::finalize`] closes the current batch.
/// Types of earlier batches remain available for lookup,
///   so a document may use types declared by a document imported before
///   it.
#[derive(Debug, Default)]
pub struct TypeRegistry<'a> {
    batches: Vec<Vec<TypeDescriptor<'a>>>,
    pending: Vec<Pending<'a>>,
}

impl<'a> TypeRegistry<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register the DataType node `node` of the document `nodes`.
    ///
    /// The layout of the type is classified by its supertype:
    ///
    ///   - `Enumeration` produces an [enum](TypeKind::Enum) stored as an
    ///       `Int32`;
    ///   - `Structure`,
    ///       `OptionSet`,
    ///       or a custom structure produces a [structure](TypeKind::Structure)
    ///       laid out from the fields of the node's definition
    ///         (a union if the definition says so);
    ///   - `Union` produces a [union](TypeKind::Union); and
    ///   - any other built-in or custom supertype is copied wholesale.
    ///
    /// The layout itself is computed by [`TypeRegistry::finalize`].
    ///
    /// Errors
    /// ======
    /// - [`LayoutError::UnknownParentType`] if the supertype is not known,
    ///     in which case the type is not registered.
    pub fn register(
        &mut self,
        node: &Node<'a>,
        nodes: &NodeSet<'a>,
    ) -> Result<(), LayoutError> {
        let parent = node.supertype().ok_or_else(|| {
            LayoutError::UnknownParentType {
                type_id: node.id.to_string(),
                parent: None,
            }
        })?;

        let definition = node.definition();
        let encoding = nodes.encoding_of(node.id);

        let mut pending = if parent == well_known::ENUMERATION {
            let mut desc = TypeDescriptor::new(node, TypeKind::Enum);
            desc.apply(Storage::builtin(BuiltinType::Int32));

            Pending {
                desc,
                basis: Basis::Done,
            }
        } else if parent == well_known::UNION
            || definition.map(|d| d.is_union).unwrap_or(false)
        {
            Pending {
                desc: Self::with_members(node, TypeKind::Union, definition),
                basis: Basis::Union,
            }
        } else if parent == well_known::STRUCTURE
            || parent == well_known::OPTION_SET
        {
            Pending {
                desc: Self::with_members(node, TypeKind::Structure, definition),
                basis: Basis::Struct(None),
            }
        } else if let Some(parent_desc) = self.find_custom_type(parent) {
            match parent_desc.kind {
                TypeKind::Structure | TypeKind::OptionalStructure => Pending {
                    desc: Self::with_members(
                        node,
                        TypeKind::Structure,
                        definition,
                    ),
                    basis: Basis::Struct(Some(parent)),
                },
                kind => Pending {
                    desc: TypeDescriptor::new(node, kind),
                    basis: Basis::Copy(parent),
                },
            }
        } else if let Some(ty) = BuiltinType::from_id(parent) {
            let mut desc = TypeDescriptor::new(node, TypeKind::Builtin(ty));
            desc.apply(Storage::builtin(ty));

            Pending {
                desc,
                basis: Basis::Done,
            }
        } else {
            return Err(LayoutError::UnknownParentType {
                type_id: node.id.to_string(),
                parent: Some(parent.to_string()),
            });
        };

        pending.desc.binary_encoding_id = match pending.desc.kind {
            // Shares the encoding of the built-in type.
            TypeKind::Builtin(ty) => encoding.or(Some(ty.id())),
            _ => encoding,
        };

        tracing::trace!(
            id = %node.id,
            kind = %pending.desc.kind,
            "registered data type"
        );

        self.pending.push(pending);
        Ok(())
    }

    fn with_members(
        node: &Node<'a>,
        kind: TypeKind,
        definition: Option<&DataTypeDefinition<'a>>,
    ) -> TypeDescriptor<'a> {
        let mut desc = TypeDescriptor::new(node, kind);

        // Fields of enum-like definitions name values,
        //   not storage.
        let fields = definition
            .filter(|d| !d.is_enum && !d.is_option_set)
            .map(|d| d.fields.as_slice())
            .unwrap_or_default();

        desc.members = fields
            .iter()
            .map(|field| TypeMember {
                name: field.name,
                declared_type: field.datatype,
                member_type: None,
                is_array: field.is_array(),
                is_optional: field.is_optional,
                padding: 0,
            })
            .collect();

        if desc.members.iter().any(|m| m.is_optional) && kind != TypeKind::Union
        {
            desc.kind = TypeKind::OptionalStructure;
        }

        desc
    }

    /// Compute the layout of every type registered since the last call.
    ///
    /// Returns a diagnostic for each type whose layout could not be
    ///   computed;
    ///     such types remain registered but unsized.
    pub fn finalize(&mut self, nodes: &NodeSet<'a>) -> Vec<LayoutError> {
        let mut passes = 0;

        loop {
            passes += 1;
            let mut progress = false;

            for i in 0..self.pending.len() {
                if self.pending[i].desc.sized {
                    continue;
                }

                let resolved: Vec<_> = self.pending[i]
                    .desc
                    .members
                    .iter()
                    .map(|m| {
                        m.member_type
                            .or_else(|| self.resolve_member(m.declared_type, nodes))
                    })
                    .collect();

                for (member, ty) in
                    self.pending[i].desc.members.iter_mut().zip(resolved)
                {
                    member.member_type = ty;
                }

                if let Some(laid) = self.layout(&self.pending[i]) {
                    self.pending[i].desc = laid;
                    progress = true;
                }
            }

            if !progress {
                break;
            }
        }

        let errors: Vec<_> = self
            .pending
            .iter()
            .filter(|p| !p.desc.sized)
            .map(|p| p.diagnose())
            .collect();

        tracing::debug!(
            types = self.pending.len(),
            passes,
            errors = errors.len(),
            "finalized data type layouts"
        );

        let batch = self.pending.drain(..).map(|p| p.desc).collect();
        self.batches.push(batch);

        errors
    }

    /// Resolve the storage of a member declared as `declared`.
    fn resolve_member(
        &self,
        declared: NodeId<'a>,
        nodes: &NodeSet<'a>,
    ) -> Option<MemberType<'a>> {
        BuiltinType::from_id(declared)
            .map(MemberType::Builtin)
            .or_else(|| {
                self.find_custom_type(declared)
                    .map(|desc| MemberType::Custom(desc.type_id))
            })
            .or_else(|| {
                nodes
                    .find(declared)
                    .filter(|node| node.is_abstract())
                    .map(|_| MemberType::Builtin(BuiltinType::Variant))
            })
    }

    /// Storage of a single member,
    ///   if the size of its type is known.
    fn member_storage(&self, member: &TypeMember) -> Option<Storage> {
        if member.is_array {
            // Length and pointer.
            return Some(Storage {
                size: 2 * Storage::WORD.size,
                ..Storage::WORD
            });
        }

        if member.is_optional {
            return Some(Storage::WORD);
        }

        match member.member_type? {
            MemberType::Builtin(ty) => Some(Storage::builtin(ty)),
            MemberType::Custom(id) => {
                self.find_custom_type(id).and_then(TypeDescriptor::storage)
            }
        }
    }

    /// Attempt to compute the layout of `pending`,
    ///   returning the sized descriptor if all of its dependencies are
    ///   sized.
    fn layout(&self, pending: &Pending<'a>) -> Option<TypeDescriptor<'a>> {
        let mut desc = pending.desc.clone();

        // A member of an unresolved type is never ready,
        //   even if its storage (array or pointer) is.
        if desc.members.iter().any(|m| m.member_type.is_none()) {
            return None;
        }

        match pending.basis {
            Basis::Done => return None,

            Basis::Copy(parent) => {
                let parent = self.find_custom_type(parent)?;
                let storage = parent.storage()?;

                desc.kind = parent.kind;
                desc.members = parent.members.clone();
                desc.binary_encoding_id =
                    desc.binary_encoding_id.or(parent.binary_encoding_id);
                desc.apply(storage);
            }

            Basis::Struct(parent) => {
                let mut offset = 0;
                let mut align = 1;
                let mut pointer_free = true;
                let mut overlayable = true;
                let mut inherited = Vec::new();

                if let Some(parent) = parent {
                    let parent = self.find_custom_type(parent)?;
                    let storage = parent.storage()?;

                    offset = storage.size;
                    align = storage.align;
                    pointer_free = storage.pointer_free;
                    overlayable = storage.overlayable;
                    inherited = parent.members.clone();

                    if parent.kind == TypeKind::OptionalStructure {
                        desc.kind = TypeKind::OptionalStructure;
                    }
                }

                for member in desc.members.iter_mut() {
                    let storage = self.member_storage(member)?;
                    let at = align_up(offset, storage.align);

                    member.padding = at - offset;
                    offset = at + storage.size;
                    align = align.max(storage.align);
                    pointer_free &= storage.pointer_free;
                    overlayable &= storage.overlayable && member.padding == 0;
                }

                let size = align_up(offset, align);
                overlayable &= size == offset;

                inherited.append(&mut desc.members);
                desc.members = inherited;

                desc.apply(Storage {
                    size,
                    align,
                    pointer_free,
                    overlayable,
                });
            }

            Basis::Union => {
                let mut largest = 0;
                let mut align = std::mem::align_of::<u32>();
                let mut pointer_free = true;
                let mut has_array = false;

                for member in desc.members.iter() {
                    let storage = self.member_storage(member)?;

                    // The length of an array is stored separately below.
                    let size = match member.is_array {
                        true => Storage::WORD.size,
                        false => storage.size,
                    };

                    largest = largest.max(size);
                    align = align.max(storage.align);
                    pointer_free &= storage.pointer_free;
                    has_array |= member.is_array;
                }

                let start = align_up(UNION_SWITCH_SIZE, align);
                let mut size = start + largest;

                if has_array {
                    size = align_up(size, Storage::WORD.align)
                        + Storage::WORD.size;
                }

                // Members overlap;
                //   each is preceded by the discriminant and its padding.
                for member in desc.members.iter_mut() {
                    member.padding = start - UNION_SWITCH_SIZE;
                }

                desc.apply(Storage {
                    size: align_up(size, align),
                    align,
                    pointer_free,
                    overlayable: false,
                });
            }
        }

        Some(desc)
    }

    /// Look up a custom type by identifier.
    ///
    /// This searches every batch,
    ///   including types registered but not yet finalized.
    pub fn find_custom_type(
        &self,
        type_id: NodeId<'_>,
    ) -> Option<&TypeDescriptor<'a>> {
        self.iter().find(|desc| desc.type_id == type_id)
    }

    /// All registered types,
    ///   in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor<'a>> {
        self.batches
            .iter()
            .flatten()
            .chain(self.pending.iter().map(|p| &p.desc))
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum::<usize>() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset of each member of `desc`.
    ///
    /// See [`TypeDescriptor::member_offsets`].
    pub fn member_offsets(&self, desc: &TypeDescriptor) -> Vec<usize> {
        desc.member_offsets(self)
    }
}

impl<'a> TypeDescriptor<'a> {
    fn apply(&mut self, storage: Storage) {
        self.mem_size = storage.size;
        self.align = storage.align;
        self.pointer_free = storage.pointer_free;
        self.overlayable = storage.overlayable;
        self.sized = true;
    }
}

impl<'a> Pending<'a> {
    fn diagnose(&self) -> LayoutError {
        let desc = &self.desc;

        match desc.members.iter().find(|m| m.member_type.is_none()) {
            Some(member) => LayoutError::UnresolvableMemberType {
                type_id: desc.type_id.to_string(),
                member: member.name.to_string(),
                declared_type: member.declared_type.to_string(),
            },
            None => LayoutError::CyclicTypeDependency {
                type_id: desc.type_id.to_string(),
            },
        }
    }
}

/// Diagnostic produced while laying out custom data types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The supertype of a data type is neither built-in nor a registered
    ///   custom type.
    ///
    /// `parent` is [`None`] if the data type declares no supertype at all.
    UnknownParentType {
        type_id: String,
        parent: Option<String>,
    },

    /// The declared type of a member could not be resolved.
    UnresolvableMemberType {
        type_id: String,
        member: String,
        declared_type: String,
    },

    /// The layout of a type depends on itself.
    CyclicTypeDependency { type_id: String },
}

impl Display for LayoutError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::UnknownParentType {
                type_id,
                parent: None,
            } => write!(fmt, "data type {type_id} has no supertype"),
            Self::UnknownParentType {
                type_id,
                parent: Some(parent),
            } => write!(
                fmt,
                "data type {type_id} has unknown supertype {parent}"
            ),
            Self::UnresolvableMemberType {
                type_id,
                member,
                declared_type,
            } => write!(
                fmt,
                "member `{member}` of data type {type_id} has \
                 unresolvable type {declared_type}"
            ),
            Self::CyclicTypeDependency { type_id } => {
                write!(fmt, "data type {type_id} depends on itself")
            }
        }
    }
}

impl Error for LayoutError {}

#[cfg(test)]
mod test;
