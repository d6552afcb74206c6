//! Legacy (`v1`) mapping table layout.
//!
//! A flat, line-oriented format: after the `v1\t<ns...>` header, every line is one of
//!
//! ```text
//! CLASS\t<name per namespace...>
//! FIELD\t<owner class>\t<type>\t<name per namespace...>
//! METHOD\t<owner class>\t<signature>\t<name per namespace...>
//! ```
//!
//! Owner classes and descriptors are expressed in the base (first) namespace. Member
//! rows may precede the `CLASS` line of their owner; the owner is then created
//! implicitly with the remaining namespaces unmapped. Empty name cells are the
//! unmapped sentinel.

use indexmap::IndexMap;

use crate::{
    tree::{MappingTree, NameSlot},
    Result,
};

#[derive(Default)]
struct PendingClass {
    names: Option<Vec<NameSlot>>,
    fields: Vec<(String, Vec<NameSlot>)>,
    methods: Vec<(String, Vec<NameSlot>)>,
}

/// Parse a legacy layout table.
///
/// # Errors
/// Returns an error on a missing or foreign header, a row whose cell count disagrees
/// with the declared namespaces, an unknown row keyword, or duplicate identifiers.
pub(crate) fn parse(data: &[u8]) -> Result<MappingTree> {
    let text = std::str::from_utf8(data)
        .map_err(|_| malformed_error!("Legacy table is not valid UTF-8"))?;
    let mut lines = text.lines();

    let header = lines.next().unwrap_or_default();
    let mut header_cells = header.split('\t');
    if header_cells.next() != Some("v1") {
        return Err(malformed_error!("Missing legacy header line"));
    }

    let namespaces: Vec<&str> = header_cells.collect();
    let width = namespaces.len();
    // Builder construction validates the namespace count and uniqueness
    let mut builder = MappingTree::builder(&namespaces)?;

    let mut pending: IndexMap<String, PendingClass> = IndexMap::new();

    for (number, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }

        let cells: Vec<&str> = line.split('\t').collect();
        match cells[0] {
            "CLASS" => {
                if cells.len() != 1 + width {
                    return Err(malformed_error!(
                        "CLASS row at line {} has {} name cells, expected {}",
                        number + 2,
                        cells.len() - 1,
                        width
                    ));
                }

                let names: Vec<NameSlot> = cells[1..].iter().map(|c| NameSlot::from_cell(c)).collect();
                let owner = names[0].name().map(ToString::to_string).ok_or_else(|| {
                    malformed_error!("CLASS row at line {} is unmapped in the base namespace", number + 2)
                })?;

                let entry = pending.entry(owner.clone()).or_default();
                if entry.names.is_some() {
                    return Err(malformed_error!("Duplicate CLASS row for '{}'", owner));
                }
                entry.names = Some(names);
            }
            "FIELD" | "METHOD" => {
                if cells.len() != 3 + width {
                    return Err(malformed_error!(
                        "{} row at line {} has {} cells, expected {}",
                        cells[0],
                        number + 2,
                        cells.len(),
                        3 + width
                    ));
                }

                let owner = cells[1].to_string();
                let descriptor = cells[2].to_string();
                let names: Vec<NameSlot> = cells[3..].iter().map(|c| NameSlot::from_cell(c)).collect();

                let entry = pending.entry(owner).or_default();
                if cells[0] == "FIELD" {
                    entry.fields.push((descriptor, names));
                } else {
                    entry.methods.push((descriptor, names));
                }
            }
            other => {
                return Err(malformed_error!(
                    "Unknown row keyword '{}' at line {}",
                    other,
                    number + 2
                ));
            }
        }
    }

    for (owner, class) in pending {
        let names = class.names.unwrap_or_else(|| {
            // Implicit owner - only member rows mentioned it
            let mut names = vec![NameSlot::Unmapped; width];
            names[0] = NameSlot::Named(owner);
            names
        });

        builder.add_class(names)?;
        for (descriptor, names) in class.fields {
            builder.add_field(&descriptor, names)?;
        }
        for (descriptor, names) in class.methods {
            builder.add_method(&descriptor, names)?;
        }
    }

    Ok(builder.build())
}

/// Serialize a tree in the legacy layout, grouped per class in table order.
pub(crate) fn serialize(tree: &MappingTree) -> Result<Vec<u8>> {
    let mut out = String::new();

    out.push_str("v1");
    for namespace in tree.namespaces() {
        out.push('\t');
        out.push_str(namespace);
    }
    out.push('\n');

    for class in tree.classes() {
        let owner = class.names[0].name().ok_or_else(|| {
            malformed_error!("Cannot serialize a base-unmapped class in the legacy layout")
        })?;

        out.push_str("CLASS");
        for slot in &class.names {
            out.push('\t');
            out.push_str(slot.as_cell());
        }
        out.push('\n');

        for field in &class.fields {
            out.push_str("FIELD\t");
            out.push_str(owner);
            out.push('\t');
            out.push_str(&field.descriptor);
            for slot in &field.names {
                out.push('\t');
                out.push_str(slot.as_cell());
            }
            out.push('\n');
        }

        for method in &class.methods {
            out.push_str("METHOD\t");
            out.push_str(owner);
            out.push('\t');
            out.push_str(&method.descriptor);
            for slot in &method.names {
                out.push('\t');
                out.push_str(slot.as_cell());
            }
            out.push('\n');
        }
    }

    Ok(out.into_bytes())
}
