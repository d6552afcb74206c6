//! Namespace merging - joining two tables over a shared pivot namespace.
//!
//! Given table A relating the pivot namespace to some namespace X, and table B relating
//! the pivot to some namespace Y, [`merge`] produces one table relating all three. The
//! pivot identifier is the join key; classes join by name, members by name *and*
//! descriptor (two methods sharing a name but not a signature are distinct entries and
//! are never merged together).
//!
//! Completeness rule: every class whose pivot identifier appears in either input
//! appears in the output exactly once. An entry present in only one input passes
//! through with the other side's namespace unmapped - never silently dropped.
//!
//! The output is keyed by the pivot (descriptors remain expressed in it); callers
//! wanting a different column order run the [`reorder`](crate::reorder) projection on
//! the result.

use std::collections::{HashMap, HashSet};

use crate::{
    reorder::reorder,
    tree::{ClassEntry, MappingTree, MemberEntry, NameSlot, TreeBuilder},
    Error, Result,
};

/// Parameters of a merge: the shared namespace and the desired final ordering.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// The namespace used as the join key; must be declared by both inputs
    pub pivot: String,
    /// The namespace ordering of the result; `(pivot, X, Y)` when absent
    pub order: Option<Vec<String>>,
}

impl MergeRequest {
    /// A merge request over the given pivot namespace.
    #[must_use]
    pub fn new(pivot: &str) -> MergeRequest {
        MergeRequest {
            pivot: pivot.to_string(),
            order: None,
        }
    }

    /// Request the merged table in a specific namespace ordering.
    #[must_use]
    pub fn with_order(mut self, order: &[&str]) -> MergeRequest {
        self.order = Some(order.iter().map(ToString::to_string).collect());
        self
    }
}

/// Merge two two-namespace tables over their shared pivot namespace.
///
/// Inputs not keyed by the pivot are inverted first (the reorder-before-merge step),
/// so descriptors of both sides are comparable in the pivot namespace. The output
/// declares `(pivot, X, Y)` unless the request carries an explicit ordering, in which
/// case the merged table is reordered to it before returning.
///
/// # Errors
/// Returns [`Error::IncompatibleTables`] if either input does not declare the pivot,
/// has more than two namespaces, or the two non-pivot namespaces collide.
pub fn merge(a: &MappingTree, b: &MappingTree, request: &MergeRequest) -> Result<MappingTree> {
    let a = keyed_by_pivot(a, &request.pivot, "A")?;
    let b = keyed_by_pivot(b, &request.pivot, "B")?;

    let x = a.namespaces()[1].clone();
    let y = b.namespaces()[1].clone();
    if x == y {
        return Err(Error::IncompatibleTables(format!(
            "both inputs map the pivot to the same namespace '{x}'"
        )));
    }

    let mut builder = MappingTree::builder(&[&request.pivot, &x, &y])?;
    for (key, value) in a.properties() {
        builder.add_property(key, value.as_deref());
    }
    for (key, value) in b.properties() {
        if !a.properties().contains_key(key) {
            builder.add_property(key, value.as_deref());
        }
    }

    // Index B by pivot identifier
    let b_index: HashMap<&str, &ClassEntry> = b
        .classes()
        .iter()
        .filter_map(|class| class.names[0].name().map(|name| (name, class)))
        .collect();
    let mut used_b: HashSet<&str> = HashSet::new();

    // Walk A; for each entry, join the matching B entry by pivot identifier
    for class in a.classes() {
        let counterpart = class
            .names[0]
            .name()
            .and_then(|name| b_index.get(name).copied());
        if let (Some(name), Some(_)) = (class.names[0].name(), counterpart) {
            used_b.insert(name);
        }

        emit_joined(&mut builder, class, counterpart)?;
    }

    // Pivot identifiers present only in B pass through with X unmapped
    for class in b.classes() {
        if class.names[0].name().is_some_and(|name| used_b.contains(name)) {
            continue;
        }

        builder.add_class(pass_through(&class.names))?;
        for method in &class.methods {
            builder.add_method(&method.descriptor, pass_through(&method.names))?;
        }
        for field in &class.fields {
            builder.add_field(&field.descriptor, pass_through(&field.names))?;
        }
    }

    let merged = builder.build();
    match &request.order {
        Some(order) => {
            let order: Vec<&str> = order.iter().map(String::as_str).collect();
            reorder(&merged, &order)
        }
        None => Ok(merged),
    }
}

/// Return `tree` keyed by the pivot namespace, inverting it when needed.
fn keyed_by_pivot(tree: &MappingTree, pivot: &str, side: &str) -> Result<MappingTree> {
    let Some(index) = tree.namespace_index(pivot) else {
        return Err(Error::IncompatibleTables(format!(
            "table {side} does not declare the pivot namespace '{pivot}'"
        )));
    };

    if tree.namespaces().len() != 2 {
        return Err(Error::IncompatibleTables(format!(
            "table {side} declares {} namespaces, merging expects 2",
            tree.namespaces().len()
        )));
    }

    if index == 0 {
        return Ok(tree.clone());
    }

    let other = tree.namespaces()[0].clone();
    reorder(tree, &[pivot, &other])
}

fn emit_joined(
    builder: &mut TreeBuilder,
    class: &ClassEntry,
    counterpart: Option<&ClassEntry>,
) -> Result<()> {
    let y_slot = |entry: Option<&MemberEntry>| {
        entry.map_or(NameSlot::Unmapped, |member| member.names[1].clone())
    };

    builder.add_class(vec![
        class.names[0].clone(),
        class.names[1].clone(),
        counterpart.map_or(NameSlot::Unmapped, |c| c.names[1].clone()),
    ])?;

    let mut used_methods: HashSet<usize> = HashSet::new();
    let mut used_fields: HashSet<usize> = HashSet::new();

    for method in &class.methods {
        let matched = counterpart.and_then(|c| {
            find_member(&c.methods, method.names[0].name(), &method.descriptor)
        });
        if let Some((index, _)) = matched {
            used_methods.insert(index);
        }

        builder.add_method(
            &method.descriptor,
            vec![
                method.names[0].clone(),
                method.names[1].clone(),
                y_slot(matched.map(|(_, member)| member)),
            ],
        )?;
    }

    for field in &class.fields {
        let matched = counterpart
            .and_then(|c| find_member(&c.fields, field.names[0].name(), &field.descriptor));
        if let Some((index, _)) = matched {
            used_fields.insert(index);
        }

        builder.add_field(
            &field.descriptor,
            vec![
                field.names[0].clone(),
                field.names[1].clone(),
                y_slot(matched.map(|(_, member)| member)),
            ],
        )?;
    }

    // Members of the matched B class with no counterpart in A
    if let Some(counterpart) = counterpart {
        for (index, method) in counterpart.methods.iter().enumerate() {
            if !used_methods.contains(&index) {
                builder.add_method(&method.descriptor, pass_through(&method.names))?;
            }
        }
        for (index, field) in counterpart.fields.iter().enumerate() {
            if !used_fields.contains(&index) {
                builder.add_field(&field.descriptor, pass_through(&field.names))?;
            }
        }
    }

    Ok(())
}

fn find_member<'a>(
    members: &'a [MemberEntry],
    name: Option<&str>,
    descriptor: &str,
) -> Option<(usize, &'a MemberEntry)> {
    let name = name?;
    members
        .iter()
        .enumerate()
        .find(|(_, member)| member.descriptor == descriptor && member.names[0].name() == Some(name))
}

/// `(pivot, Y)` names of a B-only entry widened to `(pivot, X unmapped, Y)`.
fn pass_through(names: &[NameSlot]) -> Vec<NameSlot> {
    vec![names[0].clone(), NameSlot::Unmapped, names[1].clone()]
}
