// Tests for native data type layout
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
use crate::node::{
    DataTypeAttrs, DataTypeField, NodeAttrs, NodeClass, QualifiedName,
    RefBucket, Reference,
};
use std::mem::{align_of, size_of};

const INT32: NodeId<'static> = NodeId::new(0, "i=6");
const BOOLEAN: NodeId<'static> = NodeId::new(0, "i=1");
const DOUBLE: NodeId<'static> = NodeId::new(0, "i=11");
const STRING: NodeId<'static> = NodeId::new(0, "i=12");

fn field<'a>(name: &'a str, datatype: NodeId<'a>) -> DataTypeField<'a> {
    DataTypeField {
        name,
        datatype,
        value_rank: -1,
        array_dimensions: None,
        is_optional: false,
        value: None,
    }
}

fn array<'a>(name: &'a str, datatype: NodeId<'a>) -> DataTypeField<'a> {
    DataTypeField {
        value_rank: 1,
        ..field(name, datatype)
    }
}

fn optional<'a>(name: &'a str, datatype: NodeId<'a>) -> DataTypeField<'a> {
    DataTypeField {
        is_optional: true,
        ..field(name, datatype)
    }
}

fn datatype<'a>(
    id: &'a str,
    name: &'a str,
    parent: NodeId<'a>,
    fields: Vec<DataTypeField<'a>>,
) -> Node<'a> {
    let mut node = Node::new(NodeClass::DataType, NodeId::parse(id));
    node.browse_name = QualifiedName::new(1, name);

    node.refs.attach(
        Reference::new(well_known::HAS_SUBTYPE, parent, false),
        RefBucket::Hierarchical,
    );

    node.attrs = NodeAttrs::DataType(DataTypeAttrs {
        is_abstract: false,
        definition: Some(DataTypeDefinition {
            name: Some(name),
            fields,
            ..Default::default()
        }),
    });

    node
}

/// Register each of `types` in order and finalize them as one batch.
fn layout<'a>(
    nodes: &NodeSet<'a>,
    types: &[&Node<'a>],
) -> (TypeRegistry<'a>, Vec<LayoutError>) {
    let mut sut = TypeRegistry::new();

    for node in types {
        sut.register(node, nodes).expect("registration failed");
    }

    let errors = sut.finalize(nodes);
    (sut, errors)
}

fn find<'r, 'a>(sut: &'r TypeRegistry<'a>, id: &str) -> &'r TypeDescriptor<'a> {
    sut.find_custom_type(NodeId::parse(id))
        .unwrap_or_else(|| panic!("type {id} not registered"))
}

#[test]
fn struct_of_two_int32() {
    let nodes = NodeSet::new();
    let point = datatype(
        "ns=1;i=3001",
        "Point",
        well_known::STRUCTURE,
        vec![field("x", INT32), field("y", INT32)],
    );

    let (sut, errors) = layout(&nodes, &[&point]);
    assert_eq!(Vec::<LayoutError>::new(), errors);

    let desc = find(&sut, "ns=1;i=3001");
    assert!(desc.is_sized());
    assert_eq!(TypeKind::Structure, desc.kind);
    assert_eq!(8, desc.mem_size);
    assert_eq!(vec![0, 4], desc.member_offsets(&sut));
    assert!(desc.pointer_free);
    assert_eq!("Point", desc.type_name);
}

#[test]
fn base_structure_and_enumeration_members() {
    let nodes = NodeSet::new();
    let limits = datatype(
        "ns=1;i=3001",
        "Limits",
        well_known::STRUCTURE,
        vec![
            field("state", NodeId::new(0, "i=852")),
            field("range", NodeId::new(0, "i=884")),
        ],
    );

    let (sut, errors) = layout(&nodes, &[&limits]);
    assert_eq!(Vec::<LayoutError>::new(), errors);

    let desc = find(&sut, "ns=1;i=3001");
    let range_offset = align_of::<f64>().max(size_of::<i32>());

    assert!(desc.is_sized());
    assert_eq!(
        vec![
            Some(MemberType::Builtin(BuiltinType::Int32)),
            Some(MemberType::Builtin(BuiltinType::Range)),
        ],
        desc.members.iter().map(|m| m.member_type).collect::<Vec<_>>()
    );
    assert_eq!(vec![0, range_offset], desc.member_offsets(&sut));
    assert_eq!(range_offset + 2 * size_of::<f64>(), desc.mem_size);
    assert!(desc.pointer_free);
}

#[test]
fn subtype_begins_with_parent_layout() {
    let nodes = NodeSet::new();
    let point = datatype(
        "ns=1;i=3001",
        "Point",
        well_known::STRUCTURE,
        vec![field("x", INT32), field("y", INT32), field("z", INT32)],
    );
    let with_offset = datatype(
        "ns=1;i=3002",
        "PointWithOffset",
        NodeId::new(1, "i=3001"),
        vec![field("x", INT32), field("y", INT32)],
    );

    let (sut, errors) = layout(&nodes, &[&point, &with_offset]);
    assert!(errors.is_empty(), "{errors:?}");

    assert_eq!(12, find(&sut, "ns=1;i=3001").mem_size);

    let desc = find(&sut, "ns=1;i=3002");
    assert_eq!(20, desc.mem_size);
    assert_eq!(5, desc.members.len());
    assert_eq!(vec![0, 4, 8, 12, 16], desc.member_offsets(&sut));
    assert_eq!(
        vec!["x", "y", "z", "x", "y"],
        desc.members.iter().map(|m| m.name).collect::<Vec<_>>()
    );
}

#[test]
fn array_member_matches_native_layout() {
    #[allow(dead_code)]
    #[repr(C)]
    struct Native {
        flag: bool,
        length: usize,
        data: *const i32,
    }

    let nodes = NodeSet::new();
    let node = datatype(
        "ns=1;i=3001",
        "Flagged",
        well_known::STRUCTURE,
        vec![field("flag", BOOLEAN), array("values", INT32)],
    );

    let (sut, _) = layout(&nodes, &[&node]);
    let desc = find(&sut, "ns=1;i=3001");

    assert_eq!(size_of::<Native>(), desc.mem_size);
    assert_eq!(align_of::<Native>(), desc.align);
    assert_eq!(vec![0, align_of::<usize>()], desc.member_offsets(&sut));
    assert!(!desc.pointer_free);
    assert!(!desc.overlayable);
}

#[test]
fn tail_is_padded_to_alignment() {
    let nodes = NodeSet::new();
    let node = datatype(
        "ns=1;i=3001",
        "DoubleThenBool",
        well_known::STRUCTURE,
        vec![field("d", DOUBLE), field("b", BOOLEAN)],
    );

    let (sut, _) = layout(&nodes, &[&node]);
    let desc = find(&sut, "ns=1;i=3001");

    assert_eq!(16, desc.mem_size);
    assert!(!desc.overlayable, "tail padding is not overlayable");
}

#[test]
fn member_types_may_be_declared_later() {
    let nodes = NodeSet::new();
    let outer = datatype(
        "ns=1;i=3001",
        "Outer",
        well_known::STRUCTURE,
        vec![field("inner", NodeId::new(1, "i=3002")), field("n", INT32)],
    );
    let inner = datatype(
        "ns=1;i=3002",
        "Inner",
        well_known::STRUCTURE,
        vec![field("a", DOUBLE)],
    );

    let (sut, errors) = layout(&nodes, &[&outer, &inner]);
    assert!(errors.is_empty(), "{errors:?}");

    let desc = find(&sut, "ns=1;i=3001");
    assert_eq!(
        Some(MemberType::Custom(NodeId::new(1, "i=3002"))),
        desc.members[0].member_type
    );
    assert_eq!(16, desc.mem_size);
}

#[test]
fn mutually_dependent_types_are_diagnosed() {
    let nodes = NodeSet::new();
    let a = datatype(
        "ns=1;i=3001",
        "A",
        well_known::STRUCTURE,
        vec![field("b", NodeId::new(1, "i=3002"))],
    );
    let b = datatype(
        "ns=1;i=3002",
        "B",
        well_known::STRUCTURE,
        vec![field("a", NodeId::new(1, "i=3001"))],
    );

    let (sut, errors) = layout(&nodes, &[&a, &b]);

    assert_eq!(
        vec![
            LayoutError::CyclicTypeDependency {
                type_id: "ns=1;i=3001".into()
            },
            LayoutError::CyclicTypeDependency {
                type_id: "ns=1;i=3002".into()
            },
        ],
        errors
    );
    assert!(!find(&sut, "ns=1;i=3001").is_sized());
}

#[test]
fn self_referencing_array_is_not_a_cycle() {
    let nodes = NodeSet::new();
    let tree = datatype(
        "ns=1;i=3001",
        "Tree",
        well_known::STRUCTURE,
        vec![array("children", NodeId::new(1, "i=3001"))],
    );

    let (sut, errors) = layout(&nodes, &[&tree]);

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(2 * size_of::<usize>(), find(&sut, "ns=1;i=3001").mem_size);
}

#[test]
fn unresolvable_member_is_diagnosed() {
    let nodes = NodeSet::new();
    let node = datatype(
        "ns=1;i=3001",
        "Broken",
        well_known::STRUCTURE,
        vec![field("what", NodeId::new(1, "i=9999"))],
    );

    let (sut, errors) = layout(&nodes, &[&node]);

    assert_eq!(
        vec![LayoutError::UnresolvableMemberType {
            type_id: "ns=1;i=3001".into(),
            member: "what".into(),
            declared_type: "ns=1;i=9999".into(),
        }],
        errors
    );
    assert_eq!(None, find(&sut, "ns=1;i=3001").members[0].member_type);
}

#[test]
fn abstract_member_type_is_a_variant() {
    let mut nodes = NodeSet::new();

    let mut base = Node::new(NodeClass::DataType, NodeId::new(1, "i=3100"));
    base.attrs = NodeAttrs::DataType(DataTypeAttrs {
        is_abstract: true,
        definition: None,
    });
    nodes.push(base);

    let node = datatype(
        "ns=1;i=3001",
        "Holder",
        well_known::STRUCTURE,
        vec![field("any", NodeId::new(1, "i=3100"))],
    );

    let (sut, errors) = layout(&nodes, &[&node]);
    assert!(errors.is_empty(), "{errors:?}");

    let desc = find(&sut, "ns=1;i=3001");
    assert_eq!(
        Some(MemberType::Builtin(BuiltinType::Variant)),
        desc.members[0].member_type
    );
    assert_eq!(BuiltinType::Variant.size(), desc.mem_size);
}

#[test]
fn optional_member_is_a_pointer() {
    let nodes = NodeSet::new();
    let node = datatype(
        "ns=1;i=3001",
        "Options",
        well_known::STRUCTURE,
        vec![field("n", INT32), optional("s", STRING)],
    );

    let (sut, _) = layout(&nodes, &[&node]);
    let desc = find(&sut, "ns=1;i=3001");

    assert_eq!(TypeKind::OptionalStructure, desc.kind);
    assert!(!desc.pointer_free);
    assert_eq!(2 * size_of::<usize>(), desc.mem_size);
}

#[test]
fn enumeration_is_int32() {
    let nodes = NodeSet::new();
    let mut node = datatype(
        "ns=1;i=3001",
        "Color",
        well_known::ENUMERATION,
        vec![],
    );

    if let NodeAttrs::DataType(attrs) = &mut node.attrs {
        attrs.definition = Some(DataTypeDefinition {
            fields: vec![
                DataTypeField {
                    value: Some(0),
                    ..field("Red", NodeId::NULL)
                },
                DataTypeField {
                    value: Some(1),
                    ..field("Green", NodeId::NULL)
                },
            ],
            is_enum: true,
            ..Default::default()
        });
    }

    let (sut, errors) = layout(&nodes, &[&node]);
    assert!(errors.is_empty(), "{errors:?}");

    let desc = find(&sut, "ns=1;i=3001");
    assert_eq!(TypeKind::Enum, desc.kind);
    assert_eq!(4, desc.mem_size);
    assert!(desc.members.is_empty());
}

#[test]
fn builtin_subtype_copies_parent() {
    let nodes = NodeSet::new();
    let node = datatype("ns=1;i=3001", "Name", STRING, vec![]);

    let (sut, _) = layout(&nodes, &[&node]);
    let desc = find(&sut, "ns=1;i=3001");

    assert_eq!(TypeKind::Builtin(BuiltinType::String), desc.kind);
    assert_eq!(BuiltinType::String.size(), desc.mem_size);
    assert_eq!(Some(STRING), desc.binary_encoding_id);
}

#[test]
fn custom_subtype_of_non_structure_copies_parent() {
    let nodes = NodeSet::new();
    let color = datatype("ns=1;i=3001", "Color", well_known::ENUMERATION, vec![]);
    let shade =
        datatype("ns=1;i=3002", "Shade", NodeId::new(1, "i=3001"), vec![]);

    let (sut, errors) = layout(&nodes, &[&color, &shade]);
    assert!(errors.is_empty(), "{errors:?}");

    let desc = find(&sut, "ns=1;i=3002");
    assert_eq!(TypeKind::Enum, desc.kind);
    assert_eq!(4, desc.mem_size);
}

#[test]
fn union_stores_discriminant_and_largest_member() {
    let nodes = NodeSet::new();
    let mut node = datatype(
        "ns=1;i=3001",
        "Either",
        well_known::UNION,
        vec![field("i", INT32), field("d", DOUBLE)],
    );

    if let NodeAttrs::DataType(attrs) = &mut node.attrs {
        if let Some(def) = attrs.definition.as_mut() {
            def.is_union = true;
        }
    }

    let (sut, errors) = layout(&nodes, &[&node]);
    assert!(errors.is_empty(), "{errors:?}");

    let desc = find(&sut, "ns=1;i=3001");
    assert_eq!(TypeKind::Union, desc.kind);
    assert_eq!(16, desc.mem_size);
    assert_eq!(vec![8, 8], desc.member_offsets(&sut));
}

#[test]
fn union_with_array_reserves_length() {
    let nodes = NodeSet::new();
    let node = datatype(
        "ns=1;i=3001",
        "Many",
        well_known::UNION,
        vec![field("b", BOOLEAN), array("list", INT32)],
    );

    let (sut, _) = layout(&nodes, &[&node]);
    let word = size_of::<usize>();

    // Discriminant, padding, pointer, then length.
    assert_eq!(
        align_of::<usize>().max(4) + 2 * word,
        find(&sut, "ns=1;i=3001").mem_size
    );
}

#[test]
fn unknown_parent_is_rejected() {
    let nodes = NodeSet::new();
    let node =
        datatype("ns=1;i=3001", "Orphan", NodeId::new(1, "i=404"), vec![]);
    let mut sut = TypeRegistry::new();

    assert_eq!(
        Err(LayoutError::UnknownParentType {
            type_id: "ns=1;i=3001".into(),
            parent: Some("ns=1;i=404".into()),
        }),
        sut.register(&node, &nodes)
    );
    assert!(sut.is_empty());
}

#[test]
fn binary_encoding_comes_from_document() {
    let mut nodes = NodeSet::new();
    let node = datatype("ns=1;i=3001", "Point", well_known::STRUCTURE, vec![]);

    let mut encoding = Node::new(NodeClass::Object, NodeId::new(1, "i=5001"));
    encoding.browse_name = QualifiedName::new(0, well_known::DEFAULT_BINARY);
    nodes.finalize_reference(
        &encoding,
        &Reference::new(well_known::HAS_ENCODING, node.id, false),
    );

    let (sut, _) = layout(&nodes, &[&node]);

    assert_eq!(
        Some(NodeId::new(1, "i=5001")),
        find(&sut, "ns=1;i=3001").binary_encoding_id
    );
}

#[test]
fn earlier_batches_remain_visible() {
    let nodes = NodeSet::new();
    let point = datatype(
        "ns=1;i=3001",
        "Point",
        well_known::STRUCTURE,
        vec![field("x", INT32)],
    );
    let (mut sut, _) = layout(&nodes, &[&point]);

    let line = datatype(
        "ns=2;i=1",
        "Line",
        well_known::STRUCTURE,
        vec![field("a", point.id), field("b", point.id)],
    );
    sut.register(&line, &nodes).expect("registration failed");
    assert!(sut.finalize(&nodes).is_empty());

    assert_eq!(2, sut.len());
    assert_eq!(8, find(&sut, "ns=2;i=1").mem_size);
    assert_eq!(2, sut.iter().filter(|desc| desc.is_sized()).count());
}
