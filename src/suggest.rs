//! Heuristic field-name suggestion.
//!
//! Fills unmapped field names in the table's last (human-readable) namespace by
//! correlating field declarations of a reference compiled binary with method names the
//! table already knows - a field read by a mapped getter of its owning class is named
//! after that getter; a field initialized from a string constant is named after the
//! constant.
//!
//! This is a best-effort pass and never fails the pipeline: a field the heuristic
//! cannot name keeps its unmapped sentinel, recorded in the [`SuggestionReport`] and
//! logged, never surfaced as an error. Given the same binary facts and input table the
//! output is deterministic.
//!
//! The binary itself is read through the [`ClassReader`] collaborator; how those
//! structural facts are extracted from bytecode is outside this crate's contract.

use std::collections::HashSet;

use log::{debug, info};

use crate::tree::{MappingTree, MemberEntry, NameSlot};

/// Structural facts about one field, as read from a reference binary.
///
/// Names and descriptors are expressed in the table's base namespace, which is the
/// namespace the reference binary is compiled in.
#[derive(Debug, Clone)]
pub struct FieldShape {
    /// The field's name in the base namespace
    pub name: String,
    /// The field's type descriptor in the base namespace
    pub descriptor: String,
    /// Base-namespace name of a method returning exactly this field, if any
    pub getter: Option<String>,
    /// Constant the field is initialized from, for enum-style fields
    pub constant_name: Option<String>,
}

/// Structural facts about one class of the reference binary.
#[derive(Debug, Clone)]
pub struct ClassShape {
    /// The class name in the base namespace
    pub name: String,
    /// The fields the class declares
    pub fields: Vec<FieldShape>,
}

/// Collaborator producing structural facts from a compiled reference binary.
pub trait ClassReader {
    /// All classes of the reference binary, with their field declarations.
    fn classes(&self) -> Vec<ClassShape>;
}

/// Outcome counts of a suggestion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionReport {
    /// Fields that received a proposed name
    pub proposed: usize,
    /// Fields that remain unmapped after the pass
    pub unresolved: usize,
}

/// Propose names for fields unmapped in the table's last namespace.
///
/// Returns a new tree with proposals filled in, plus the pass report. Entries the
/// heuristic cannot resolve are left untouched.
pub fn suggest(tree: &MappingTree, reader: &dyn ClassReader) -> (MappingTree, SuggestionReport) {
    let target = tree.namespaces().len() - 1;
    let mut report = SuggestionReport::default();

    let shapes = reader.classes();
    let mut classes = tree.classes().to_vec();

    for class in &mut classes {
        let shape = class.names[0]
            .name()
            .and_then(|name| shapes.iter().find(|shape| shape.name == name));

        // Names already taken in the target namespace of this class
        let mut taken: HashSet<String> = class
            .fields
            .iter()
            .filter_map(|field| field.names[target].name().map(ToString::to_string))
            .collect();

        let methods = &class.methods;
        for field in &mut class.fields {
            if !field.names[target].is_unmapped() {
                continue;
            }

            let proposal = shape.and_then(|shape| {
                let declared = shape.fields.iter().find(|candidate| {
                    Some(candidate.name.as_str()) == field.names[0].name()
                        && candidate.descriptor == field.descriptor
                })?;
                propose(declared, methods, target)
            });

            match proposal {
                Some(name) if !taken.contains(&name) => {
                    debug!(
                        "proposing '{}' for field {} {}",
                        name,
                        field.names[0].as_cell(),
                        field.descriptor
                    );
                    taken.insert(name.clone());
                    field.names[target] = NameSlot::Named(name);
                    report.proposed += 1;
                }
                _ => report.unresolved += 1,
            }
        }
    }

    info!(
        ":populated field names ({} proposed, {} left unmapped)",
        report.proposed, report.unresolved
    );

    let result = MappingTree::from_parts(
        tree.namespaces().to_vec(),
        tree.properties().clone(),
        classes,
    );
    (result, report)
}

/// Derive a name for one declared field, if the structural facts allow it.
///
/// Getter correlation searches `methods` only, the method rows of the field's owning
/// class. Obfuscated base names repeat freely across classes, so a tree-wide search
/// would pick up unrelated methods.
fn propose(declared: &FieldShape, methods: &[MemberEntry], target: usize) -> Option<String> {
    if let Some(constant) = &declared.constant_name {
        return Some(constant.clone());
    }

    // Getter correlation: the getter's mapped name, accessor prefix stripped
    let getter = declared.getter.as_deref()?;
    let mapped = methods
        .iter()
        .find(|method| method.names[0].name() == Some(getter))
        .and_then(|method| method.names[target].name())?;

    let stem = mapped
        .strip_prefix("get")
        .or_else(|| mapped.strip_prefix("is"))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(mapped);

    let mut chars = stem.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}
