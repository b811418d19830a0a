// Tests for dependency sorting
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
use crate::node::{NodeClass, NodeSet, RefBucket, Reference};

const ORGANIZES: NodeId<'static> = NodeId::new(0, "i=35");
const HAS_COMPONENT: NodeId<'static> = NodeId::new(0, "i=47");

fn object<'a>(id: &'a str, parents: &[&'a str]) -> Node<'a> {
    let mut node = Node::new(NodeClass::Object, NodeId::parse(id));

    for parent in parents {
        node.refs.attach(
            Reference::new(ORGANIZES, NodeId::parse(parent), false),
            RefBucket::Hierarchical,
        );
    }

    node
}

/// Add each node to both a document and a sort,
///   returning the sorted identifiers.
fn sort_ids<'a>(nodes: Vec<Node<'a>>) -> SortResult<Vec<NodeId<'a>>> {
    let mut doc = NodeSet::new();
    let mut sut = DependencySort::new();

    for node in nodes {
        let copy = node.clone();
        let nref = doc.push(node);
        sut.add_node(nref, &copy);
    }

    sut.sort()
        .map(|order| order.into_iter().map(|nref| doc.get(nref).id).collect())
}

fn position(order: &[NodeId], id: &str) -> usize {
    order
        .iter()
        .position(|x| *x == NodeId::parse(id))
        .unwrap_or_else(|| panic!("{id} not emitted"))
}

#[test]
fn parent_precedes_child() {
    let order = sort_ids(vec![
        object("ns=1;i=2", &["ns=1;i=1"]),
        object("ns=1;i=1", &[]),
    ])
    .expect("sort failed");

    assert_eq!(
        vec![NodeId::new(1, "i=1"), NodeId::new(1, "i=2")],
        order
    );
}

#[test]
fn every_edge_is_respected() {
    // A diamond plus a tail:
    //   1 -> {2, 3} -> 4 -> 5
    let order = sort_ids(vec![
        object("ns=1;i=5", &["ns=1;i=4"]),
        object("ns=1;i=4", &["ns=1;i=2", "ns=1;i=3"]),
        object("ns=1;i=3", &["ns=1;i=1"]),
        object("ns=1;i=2", &["ns=1;i=1"]),
        object("ns=1;i=1", &[]),
    ])
    .expect("sort failed");

    assert_eq!(5, order.len());

    for (parent, child) in [
        ("ns=1;i=1", "ns=1;i=2"),
        ("ns=1;i=1", "ns=1;i=3"),
        ("ns=1;i=2", "ns=1;i=4"),
        ("ns=1;i=3", "ns=1;i=4"),
        ("ns=1;i=4", "ns=1;i=5"),
    ] {
        assert!(
            position(&order, parent) < position(&order, child),
            "{parent} must precede {child}"
        );
    }
}

#[test]
fn forward_references_impose_no_order() {
    let mut parent = object("ns=1;i=1", &[]);
    parent.refs.attach(
        Reference::new(HAS_COMPONENT, NodeId::new(1, "i=2"), true),
        RefBucket::Hierarchical,
    );

    let order = sort_ids(vec![object("ns=1;i=2", &[]), parent])
        .expect("sort failed");

    // Both are in the first wave and so are ordered by identifier.
    assert_eq!(
        vec![NodeId::new(1, "i=1"), NodeId::new(1, "i=2")],
        order
    );
}

#[test]
fn placeholders_are_not_emitted() {
    let mut doc = NodeSet::new();
    let mut sut = DependencySort::new();

    let node = object("ns=1;i=5001", &["i=85"]);
    let nref = doc.push(node.clone());
    sut.add_node(nref, &node);

    assert_eq!(2, sut.len());
    assert_eq!(1, sut.placeholder_count());
    assert!(sut.contains(NodeId::new(1, "i=5001")));
    assert!(!sut.contains(NodeId::new(0, "i=85")));

    assert_eq!(Ok(vec![nref]), sut.sort());
}

#[test]
fn two_node_cycle_fails() {
    let result = sort_ids(vec![
        object("ns=1;i=1", &["ns=1;i=2"]),
        object("ns=1;i=2", &["ns=1;i=1"]),
    ]);

    match result {
        Err(SortError::Cycles { remaining, cycles }) => {
            assert_eq!(2, remaining);
            assert_eq!(
                vec![vec!["ns=1;i=1".to_string(), "ns=1;i=2".to_string()]],
                cycles
            );
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn dependents_of_cycle_remain_unsorted() {
    let result = sort_ids(vec![
        object("ns=1;i=1", &["ns=1;i=2"]),
        object("ns=1;i=2", &["ns=1;i=1"]),
        object("ns=1;i=3", &["ns=1;i=2"]),
        object("ns=1;i=4", &[]),
    ]);

    assert!(matches!(
        result,
        Err(SortError::Cycles { remaining: 3, .. })
    ));
}

#[test]
fn self_parent_is_a_cycle() {
    let result = sort_ids(vec![object("ns=1;i=1", &["ns=1;i=1"])]);

    assert_eq!(
        Err(SortError::Cycles {
            remaining: 1,
            cycles: vec![vec!["ns=1;i=1".to_string()]],
        }),
        result
    );
}

#[test]
fn duplicate_id_later_declaration_wins() {
    let mut doc = NodeSet::new();
    let mut sut = DependencySort::new();

    // The first declaration would form a cycle with i=2;
    //   the second does not.
    let first = object("ns=1;i=1", &["ns=1;i=2"]);
    let second = object("ns=1;i=1", &[]);
    let other = object("ns=1;i=2", &["ns=1;i=1"]);

    for node in [first, other, second] {
        let nref = doc.push(node.clone());
        sut.add_node(nref, &node);
    }

    let order = sut.sort().expect("sort failed");
    assert_eq!(2, order.len());

    // The later declaration (index 2) is the one emitted.
    assert_eq!(2, order[0].index());
    assert_eq!(NodeId::new(1, "i=2"), doc.get(order[1]).id);
}

#[test]
fn cycle_display_names_members() {
    let err = SortError::Cycles {
        remaining: 2,
        cycles: vec![vec!["ns=1;i=1".into(), "ns=1;i=2".into()]],
    };

    assert_eq!(
        "cyclic dependencies (2 nodes could not be sorted); \
         cycle: ns=1;i=1 -> ns=1;i=2",
        err.to_string()
    );
}
