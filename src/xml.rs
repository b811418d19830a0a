// UANodeSet XML processing
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

//! Processing of UANodeSet XML documents.
//!
//! Processing happens in two layers:
//!
//!   1. [`reader`] adapts [`quick_xml`] into a push-style stream of
//!        element and character data events delivered to an
//!        [`XmlSink`](reader::XmlSink); and
//!   2. [`router`] is such a sink,
//!        building a [`NodeSet`](crate::node::NodeSet) from those events.
//!
//! The reader knows nothing of UANodeSet;
//!   the router knows nothing of [`quick_xml`].

pub mod reader;
pub mod router;

pub use reader::{Attr, NodesetXmlReader, XmlSink};
pub use router::{Document, NodesetParser};
