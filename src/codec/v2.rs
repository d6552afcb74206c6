//! Versioned (`tiny` 2.0) mapping table layout.
//!
//! The metadata header declares the major/minor format version and the namespace
//! columns:
//!
//! ```text
//! tiny\t2\t0\t<ns...>
//! \t<property-key>(\t<property-value>)?     (header properties, directly after the header)
//! c\t<name per namespace...>
//! \tm\t<signature>\t<name per namespace...>
//! \tf\t<type>\t<name per namespace...>
//! ```
//!
//! Member descriptors are expressed in the base (first) namespace. Comment rows and
//! parameter/local-variable rows are skipped on parse; round-trip stability is defined
//! over tables this codec itself produced. When the `escaped-names` property is
//! present, name cells are backslash-escaped on the wire.

use crate::{
    codec::{escape, unescape},
    tree::{MappingTree, NameSlot},
    Result,
};

const ESCAPED_NAMES: &str = "escaped-names";

fn cells_to_slots(cells: &[&str], escaped: bool) -> Result<Vec<NameSlot>> {
    let mut slots = Vec::with_capacity(cells.len());

    for cell in cells {
        if escaped {
            slots.push(NameSlot::from_cell(&unescape(cell)?));
        } else {
            slots.push(NameSlot::from_cell(cell));
        }
    }

    Ok(slots)
}

/// Parse a versioned layout table.
///
/// # Errors
/// Returns an error on a missing or foreign header, fewer than two declared
/// namespaces, a row whose cell count disagrees with the declared namespaces, a
/// member row outside of any class, or duplicate identifiers.
pub(crate) fn parse(data: &[u8]) -> Result<MappingTree> {
    let text = std::str::from_utf8(data)
        .map_err(|_| malformed_error!("Versioned table is not valid UTF-8"))?;
    let mut lines = text.lines();

    let header = lines.next().unwrap_or_default();
    let header_cells: Vec<&str> = header.split('\t').collect();
    if header_cells.len() < 5 || header_cells[0] != "tiny" || header_cells[1] != "2" {
        return Err(malformed_error!("Missing versioned header line"));
    }
    if header_cells[2].parse::<u32>().is_err() {
        return Err(malformed_error!(
            "Invalid minor version '{}'",
            header_cells[2]
        ));
    }

    let namespaces = &header_cells[3..];
    let width = namespaces.len();
    let mut builder = MappingTree::builder(namespaces)?;

    let mut in_header = true;
    let mut escaped = false;
    let mut seen_class = false;

    for (number, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }

        // Parameter, local-variable and member-comment rows are no concern of the
        // mapping pipeline; they are dropped on parse.
        if line.starts_with("\t\t") {
            if seen_class {
                continue;
            }
            return Err(malformed_error!(
                "Unexpected indented row at line {}",
                number + 2
            ));
        }

        if let Some(rest) = line.strip_prefix('\t') {
            let cells: Vec<&str> = rest.split('\t').collect();

            match cells[0] {
                "m" | "f" if seen_class => {
                    if cells.len() != 2 + width {
                        return Err(malformed_error!(
                            "Member row at line {} has {} name cells, expected {}",
                            number + 2,
                            cells.len().saturating_sub(2),
                            width
                        ));
                    }

                    let descriptor = cells[1];
                    let names = cells_to_slots(&cells[2..], escaped)?;
                    if cells[0] == "m" {
                        builder.add_method(descriptor, names)?;
                    } else {
                        builder.add_field(descriptor, names)?;
                    }
                }
                // Class comment row
                "c" if seen_class => {}
                "m" | "f" | "c" => {
                    return Err(malformed_error!(
                        "Member row '{}' outside of any class at line {}",
                        cells[0],
                        number + 2
                    ));
                }
                _ if in_header => {
                    // Header property: bare key or key\tvalue
                    let key = cells[0];
                    if key == ESCAPED_NAMES {
                        escaped = true;
                    }
                    builder.add_property(key, cells.get(1).copied());
                }
                other => {
                    return Err(malformed_error!(
                        "Member row '{}' outside of any class at line {}",
                        other,
                        number + 2
                    ));
                }
            }
            continue;
        }

        let cells: Vec<&str> = line.split('\t').collect();
        if cells[0] != "c" {
            return Err(malformed_error!(
                "Unknown row keyword '{}' at line {}",
                cells[0],
                number + 2
            ));
        }
        if cells.len() != 1 + width {
            return Err(malformed_error!(
                "Class row at line {} has {} name cells, expected {}",
                number + 2,
                cells.len() - 1,
                width
            ));
        }

        in_header = false;
        seen_class = true;
        builder.add_class(cells_to_slots(&cells[1..], escaped)?)?;
    }

    Ok(builder.build())
}

fn push_slots(out: &mut String, slots: &[NameSlot], escaped: bool) {
    for slot in slots {
        out.push('\t');
        if escaped {
            out.push_str(&escape(slot.as_cell()));
        } else {
            out.push_str(slot.as_cell());
        }
    }
}

/// Serialize a tree in the versioned layout, entry order preserved.
pub(crate) fn serialize(tree: &MappingTree) -> Vec<u8> {
    let escaped = tree.properties().contains_key(ESCAPED_NAMES);
    let mut out = String::new();

    out.push_str("tiny\t2\t0");
    for namespace in tree.namespaces() {
        out.push('\t');
        out.push_str(namespace);
    }
    out.push('\n');

    for (key, value) in tree.properties() {
        out.push('\t');
        out.push_str(key);
        if let Some(value) = value {
            out.push('\t');
            out.push_str(value);
        }
        out.push('\n');
    }

    for class in tree.classes() {
        out.push('c');
        push_slots(&mut out, &class.names, escaped);
        out.push('\n');

        for method in &class.methods {
            out.push_str("\tm\t");
            out.push_str(&method.descriptor);
            push_slots(&mut out, &method.names, escaped);
            out.push('\n');
        }

        for field in &class.fields {
            out.push_str("\tf\t");
            out.push_str(&field.descriptor);
            push_slots(&mut out, &field.names, escaped);
            out.push('\n');
        }
    }

    out.into_bytes()
}
