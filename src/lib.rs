// UANodeSet loader library
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

//! Loading of UANodeSet documents into an address space.
//!
//! A UANodeSet document declares a graph of nodes connected by typed
//!   references.
//! The [loader](ld) reads such a document,
//!   orders its nodes so that every node follows its parents and
//!   supertypes,
//!   and emits them to a [`Backend`](backend::Backend).
//! Along the way it reconstructs the native in-memory layout of each
//!   custom data type the document declares (see [`types`]).
//!
//! All text of a document is copied into an [`Arena`](arena::Arena);
//!   nodes and type descriptors borrow from it rather than from the
//!   input,
//!     and so the input may be discarded as soon as it is imported.
//!
//! The pipeline is single-threaded.
//! Nothing here is synchronized,
//!   and no arena,
//!   loader,
//!   or backend may be shared between concurrent imports.

// We build docs for private items.
#![allow(rustdoc::private_intra_doc_links)]

pub mod global;

#[macro_use]
extern crate static_assertions;

pub mod arena;
pub mod backend;
pub mod fs;
pub mod id;
pub mod ld;
pub mod node;
pub mod ns;
pub mod refs;
pub mod sort;
pub mod types;
pub mod value;
pub mod xml;
