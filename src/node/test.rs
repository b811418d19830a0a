// Tests for the node graph model
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

use super::*;

const ORGANIZES: NodeId<'static> = NodeId::new(0, "i=35");

#[test]
fn node_class_from_tag() {
    assert_eq!(Some(NodeClass::Object), NodeClass::from_tag("UAObject"));
    assert_eq!(
        Some(NodeClass::ReferenceType),
        NodeClass::from_tag("UAReferenceType")
    );
    assert_eq!(None, NodeClass::from_tag("Object"));
}

#[test]
fn emit_order_follows_declaration_order() {
    let mut sorted = NodeClass::EMIT_ORDER;
    sorted.sort();

    assert_eq!(NodeClass::EMIT_ORDER, sorted);
}

#[test]
fn qualified_name_with_prefix() {
    assert_eq!(QualifiedName::new(2, "Pump"), QualifiedName::parse("2:Pump"));
}

#[test]
fn qualified_name_without_numeric_prefix() {
    assert_eq!(QualifiedName::new(0, "Pump"), QualifiedName::parse("Pump"));
    assert_eq!(
        QualifiedName::new(0, "a:b"),
        QualifiedName::parse("a:b"),
        "non-numeric prefix is part of the name"
    );
}

#[test]
fn new_node_has_class_defaults() {
    let node = Node::new(NodeClass::Variable, NodeId::new(1, "i=1"));

    assert_eq!(NodeClass::Variable, node.class());
    assert!(node.is_instance());
    assert_eq!(Some(well_known::BASE_DATA_TYPE), node.datatype());
    assert_eq!(None, node.parent());

    match node.attrs {
        NodeAttrs::Variable(attrs) => {
            assert_eq!(-1, attrs.value_rank);
            assert_eq!(1, attrs.access_level);
        }
        _ => panic!("expected variable attributes"),
    }
}

#[test]
fn types_are_not_instances() {
    for class in [
        NodeClass::ObjectType,
        NodeClass::VariableType,
        NodeClass::DataType,
        NodeClass::ReferenceType,
    ] {
        assert!(!Node::new(class, NodeId::new(1, "i=1")).is_instance());
    }
}

#[test]
fn references_attach_to_bucket() {
    let mut refs = References::default();
    let parent = Reference::new(ORGANIZES, NodeId::new(0, "i=85"), false);
    let child = Reference::new(ORGANIZES, NodeId::new(1, "i=2"), true);
    let other = Reference::new(NodeId::new(1, "i=900"), NodeId::NULL, true);

    refs.attach(parent, RefBucket::Hierarchical);
    refs.attach(child, RefBucket::Hierarchical);
    refs.attach(other, RefBucket::Unknown);

    assert_eq!(3, refs.len());
    assert!(refs.has_unknown());
    assert_eq!(vec![&parent], refs.parents().collect::<Vec<_>>());
    assert_eq!(&[other], refs.bucket(RefBucket::Unknown));
}

#[test]
fn supertype_is_inverse_has_subtype_target() {
    let mut node = Node::new(NodeClass::DataType, NodeId::new(1, "i=3001"));

    node.refs.attach(
        Reference::new(well_known::HAS_SUBTYPE, NodeId::new(1, "i=3002"), true),
        RefBucket::Hierarchical,
    );
    node.refs.attach(
        Reference::new(well_known::HAS_SUBTYPE, well_known::STRUCTURE, false),
        RefBucket::Hierarchical,
    );

    assert_eq!(Some(well_known::STRUCTURE), node.supertype());
}

#[test]
fn records_default_binary_encoding_link() {
    let mut nodes = NodeSet::new();
    let datatype = NodeId::new(1, "i=3001");

    let mut encoding = Node::new(NodeClass::Object, NodeId::new(1, "i=5001"));
    encoding.browse_name = QualifiedName::new(0, "Default Binary");

    let reference =
        Reference::new(well_known::HAS_ENCODING, datatype, false);
    nodes.finalize_reference(&encoding, &reference);

    assert_eq!(Some(encoding.id), nodes.encoding_of(datatype));
    assert_eq!(Some(datatype), nodes.datatype_of(encoding.id));
}

#[test]
fn ignores_other_encodings_and_forward_references() {
    let mut nodes = NodeSet::new();
    let datatype = NodeId::new(1, "i=3001");

    let mut xml = Node::new(NodeClass::Object, NodeId::new(1, "i=5002"));
    xml.browse_name = QualifiedName::new(0, "Default XML");
    nodes.finalize_reference(
        &xml,
        &Reference::new(well_known::HAS_ENCODING, datatype, false),
    );

    let mut binary = Node::new(NodeClass::Object, NodeId::new(1, "i=5001"));
    binary.browse_name = QualifiedName::new(0, "Default Binary");
    nodes.finalize_reference(
        &binary,
        &Reference::new(well_known::HAS_ENCODING, datatype, true),
    );

    assert_eq!(None, nodes.encoding_of(datatype));
    assert!(nodes.encodings().is_empty());
}

#[test]
fn node_refs_are_stable() {
    let mut nodes = NodeSet::new();

    let a = nodes.push(Node::new(NodeClass::Object, NodeId::new(1, "i=1")));
    let b = nodes.push(Node::new(NodeClass::Object, NodeId::new(1, "i=2")));

    assert_eq!(NodeId::new(1, "i=1"), nodes.get(a).id);
    assert_eq!(NodeId::new(1, "i=2"), nodes.get(b).id);
    assert_eq!(Some(nodes.get(b)), nodes.find(NodeId::new(1, "i=2")));
    assert_eq!(2, nodes.len());
}
