//! Namespace reordering - pure projection of a tree onto a new column order.
//!
//! Produces a new [`MappingTree`] with the same entries but the namespace columns
//! permuted (and optionally renamed) to a caller-specified order. Because member
//! descriptors are always expressed in the base (first) namespace, moving a different
//! namespace into the base position rewrites every descriptor through the tree's own
//! class mapping.
//!
//! Reordering to the order already in effect returns a tree equal to the input.

use std::collections::HashMap;

use crate::{
    tree::{MappingTree, NameSlot},
    Error, Result,
};

/// Produce an equivalent tree exposing its namespaces in `target` order.
///
/// # Arguments
/// * 'tree' - The source table
/// * 'target' - The desired namespace order; must be a permutation of the source's
///
/// # Errors
/// Returns [`Error::UnknownNamespace`] if `target` references a namespace absent from
/// the source, or a malformed-table error if it is not a full permutation.
pub fn reorder(tree: &MappingTree, target: &[&str]) -> Result<MappingTree> {
    let pairs: Vec<(&str, &str)> = target.iter().map(|ns| (*ns, *ns)).collect();
    reorder_renamed(tree, &pairs)
}

/// Like [`reorder`], renaming namespaces on the way: each `(source, label)` pair moves
/// the `source` column into that position under the name `label`.
///
/// # Errors
/// Same conditions as [`reorder`]; duplicate output labels are rejected as well.
pub fn reorder_renamed(tree: &MappingTree, target: &[(&str, &str)]) -> Result<MappingTree> {
    if target.len() != tree.namespaces().len() {
        return Err(malformed_error!(
            "Target order names {} namespaces, table declares {}",
            target.len(),
            tree.namespaces().len()
        ));
    }

    let mut indices = Vec::with_capacity(target.len());
    for (source, _) in target {
        let index = tree
            .namespace_index(source)
            .ok_or_else(|| Error::UnknownNamespace {
                name: (*source).to_string(),
            })?;
        if indices.contains(&index) {
            return Err(malformed_error!("Namespace '{}' repeats in target order", source));
        }
        indices.push(index);
    }

    let labels: Vec<&str> = target.iter().map(|(_, label)| *label).collect();
    // Builder construction rejects duplicate output labels
    let mut builder = MappingTree::builder(&labels)?;
    for (key, value) in tree.properties() {
        builder.add_property(key, value.as_deref());
    }

    let new_base = indices[0];
    let class_map = if new_base == 0 {
        None
    } else {
        Some(base_rename_map(tree, new_base))
    };

    for class in tree.classes() {
        builder.add_class(permute(&class.names, &indices))?;

        for method in &class.methods {
            builder.add_method(
                &remap_descriptor(&method.descriptor, class_map.as_ref()),
                permute(&method.names, &indices),
            )?;
        }
        for field in &class.fields {
            builder.add_field(
                &remap_descriptor(&field.descriptor, class_map.as_ref()),
                permute(&field.names, &indices),
            )?;
        }
    }

    Ok(builder.build())
}

fn permute(names: &[NameSlot], indices: &[usize]) -> Vec<NameSlot> {
    indices.iter().map(|&index| names[index].clone()).collect()
}

/// Class-name translation from the current base namespace into the new one.
///
/// A class unmapped in the new base keeps its current base name, so descriptors stay
/// resolvable for pass-through entries.
fn base_rename_map(tree: &MappingTree, new_base: usize) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for class in tree.classes() {
        if let Some(old) = class.names[0].name() {
            let new = class.names[new_base].name().unwrap_or(old);
            map.insert(old.to_string(), new.to_string());
        }
    }

    map
}

/// Rewrite every `L<class>;` reference of a JVM-style descriptor through `map`.
///
/// Works for both method signatures and bare field types; class names absent from the
/// map pass through unchanged.
fn remap_descriptor(descriptor: &str, map: Option<&HashMap<String, String>>) -> String {
    let Some(map) = map else {
        return descriptor.to_string();
    };

    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;

    while let Some(start) = rest.find('L') {
        let Some(end) = rest[start..].find(';') else {
            break;
        };

        out.push_str(&rest[..=start]);
        let name = &rest[start + 1..start + end];
        out.push_str(map.get(name).map(String::as_str).unwrap_or(name));
        out.push(';');
        rest = &rest[start + end + 1..];
    }

    out.push_str(rest);
    out
}
