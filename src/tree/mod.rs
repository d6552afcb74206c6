//! Multi-namespace mapping tree data model.
//!
//! Provides the in-memory representation of a symbol mapping table relating two or more
//! naming namespaces (e.g. obfuscated, intermediate, human-readable). A [`MappingTree`] is
//! immutable once built; derived tables (merged, reordered, suggested) are always new trees.
//!
//! # Key Components
//!
//! - [`MappingTree`] - The table itself: namespace declaration plus class entries
//! - [`ClassEntry`] / [`MemberEntry`] - Per-class and per-member rows
//! - [`NameSlot`] - Tagged per-namespace name cell, with an explicit unmapped sentinel
//! - [`TreeBuilder`] - The only way to construct a tree, enforcing the invariants
//!
//! # Invariants
//!
//! - Every entry carries exactly one [`NameSlot`] per declared namespace; a missing name
//!   is an explicit [`NameSlot::Unmapped`], never an omission.
//! - Mapped identifiers are unique within a namespace among sibling entries of the same
//!   kind (no two classes share a name in one namespace; members are distinct by
//!   name + descriptor).

use std::collections::HashSet;

use indexmap::IndexMap;
use sha1::{Digest, Sha1};

use crate::Result;

/// One per-namespace name cell of an entry.
///
/// Distinguishes "known to be unmapped in this namespace" from an absent namespace,
/// which is a structural impossibility in a well-formed tree. On the wire an unmapped
/// slot is an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameSlot {
    /// The entry is named in this namespace.
    Named(String),
    /// No name is known for this entry in this namespace.
    Unmapped,
}

impl NameSlot {
    /// Create a slot from a wire cell; empty cells are the unmapped sentinel.
    #[must_use]
    pub fn from_cell(cell: &str) -> NameSlot {
        if cell.is_empty() {
            NameSlot::Unmapped
        } else {
            NameSlot::Named(cell.to_string())
        }
    }

    /// The mapped name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            NameSlot::Named(name) => Some(name),
            NameSlot::Unmapped => None,
        }
    }

    /// `true` if this slot holds the unmapped sentinel.
    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        matches!(self, NameSlot::Unmapped)
    }

    /// The wire representation of this slot, an empty cell when unmapped.
    #[must_use]
    pub fn as_cell(&self) -> &str {
        self.name().unwrap_or("")
    }
}

/// A method or field row of a class entry.
///
/// The descriptor is always expressed in the tree's base (first) namespace; reordering
/// a tree rewrites descriptors accordingly. Two members with the same name but different
/// descriptors are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    /// JVM-style descriptor - a method signature such as `(Ljava/lang/String;)V`,
    /// or a field type such as `Lcom/example/Foo;`
    pub descriptor: String,
    /// One name per declared namespace, in declaration order
    pub names: Vec<NameSlot>,
}

/// A class row of the tree, with its member rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    /// One name per declared namespace, in declaration order
    pub names: Vec<NameSlot>,
    /// Field rows of this class
    pub fields: Vec<MemberEntry>,
    /// Method rows of this class
    pub methods: Vec<MemberEntry>,
}

/// An immutable multi-namespace symbol mapping table.
///
/// Holds an ordered list of namespace names (at least two, the first being the base
/// namespace the data is keyed and descriptor-encoded in) and the class entries relating
/// them. Constructed by [`TreeBuilder`] (used by the codec) or derived by the merge,
/// reorder and suggestion passes; never mutated afterwards.
///
/// # Examples
///
/// ```rust
/// use remapkit::tree::{MappingTree, NameSlot};
///
/// let mut builder = MappingTree::builder(&["official", "named"])?;
/// builder.add_class(vec![
///     NameSlot::Named("a/A".into()),
///     NameSlot::Named("com/example/Foo".into()),
/// ])?;
/// let tree = builder.build();
/// assert_eq!(tree.namespaces(), ["official", "named"]);
/// assert_eq!(tree.classes().len(), 1);
/// # Ok::<(), remapkit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTree {
    namespaces: Vec<String>,
    properties: IndexMap<String, Option<String>>,
    classes: Vec<ClassEntry>,
}

impl MappingTree {
    /// Rebuild a tree from entries already known to satisfy the invariants.
    ///
    /// Passes deriving a tree from an existing one (e.g. field-name suggestion, which
    /// only fills unmapped slots) use this to skip re-validation.
    pub(crate) fn from_parts(
        namespaces: Vec<String>,
        properties: IndexMap<String, Option<String>>,
        classes: Vec<ClassEntry>,
    ) -> MappingTree {
        MappingTree {
            namespaces,
            properties,
            classes,
        }
    }

    /// Start building a tree over the given namespaces.
    ///
    /// # Arguments
    /// * 'namespaces' - The namespace names, in column order; the first is the base namespace
    ///
    /// # Errors
    /// Returns an error if fewer than two namespaces are given or a name repeats.
    pub fn builder(namespaces: &[&str]) -> Result<TreeBuilder> {
        TreeBuilder::new(namespaces)
    }

    /// The declared namespace names, in column order.
    #[must_use]
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// The column index of a namespace, if declared.
    #[must_use]
    pub fn namespace_index(&self, name: &str) -> Option<usize> {
        self.namespaces.iter().position(|ns| ns == name)
    }

    /// Header properties carried by the table (versioned layout only).
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, Option<String>> {
        &self.properties
    }

    /// The class entries, in table order.
    #[must_use]
    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    /// Find a class entry by its mapped name within one namespace.
    #[must_use]
    pub fn find_class(&self, namespace_index: usize, name: &str) -> Option<&ClassEntry> {
        self.classes
            .iter()
            .find(|class| class.names.get(namespace_index).and_then(NameSlot::name) == Some(name))
    }

    /// A stable content fingerprint of this tree.
    ///
    /// Computed as the SHA-1 of the serialized versioned layout, so two trees with
    /// identical entries, order and properties fingerprint identically regardless of
    /// where they were parsed from. Used to key remap jobs and derived-artifact caches.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(crate::codec::serialize(self));
        let digest = hasher.finalize();

        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }

        out
    }
}

/// Builder for [`MappingTree`], enforcing the per-entry slot count and the
/// per-namespace uniqueness invariants as entries are appended.
///
/// Members are appended to the most recently added class.
pub struct TreeBuilder {
    namespaces: Vec<String>,
    properties: IndexMap<String, Option<String>>,
    classes: Vec<ClassEntry>,
    // One set per namespace, mapped class names only
    seen_classes: Vec<HashSet<String>>,
}

impl TreeBuilder {
    fn new(namespaces: &[&str]) -> Result<TreeBuilder> {
        if namespaces.len() < 2 {
            return Err(malformed_error!(
                "A mapping table declares at least 2 namespaces, got {}",
                namespaces.len()
            ));
        }

        let mut unique = HashSet::new();
        for namespace in namespaces {
            if !unique.insert(*namespace) {
                return Err(malformed_error!("Duplicate namespace - '{}'", namespace));
            }
        }

        Ok(TreeBuilder {
            namespaces: namespaces.iter().map(ToString::to_string).collect(),
            properties: IndexMap::new(),
            classes: Vec::new(),
            seen_classes: vec![HashSet::new(); namespaces.len()],
        })
    }

    /// Attach a header property.
    pub fn add_property(&mut self, key: &str, value: Option<&str>) {
        self.properties
            .insert(key.to_string(), value.map(ToString::to_string));
    }

    /// Append a class entry.
    ///
    /// # Errors
    /// Returns an error if the slot count disagrees with the namespace count or a
    /// mapped name collides with an earlier class in the same namespace.
    pub fn add_class(&mut self, names: Vec<NameSlot>) -> Result<()> {
        self.check_width(&names)?;

        for (index, slot) in names.iter().enumerate() {
            if let Some(name) = slot.name() {
                if !self.seen_classes[index].insert(name.to_string()) {
                    return Err(malformed_error!(
                        "Duplicate class '{}' in namespace '{}'",
                        name,
                        self.namespaces[index]
                    ));
                }
            }
        }

        self.classes.push(ClassEntry {
            names,
            fields: Vec::new(),
            methods: Vec::new(),
        });
        Ok(())
    }

    /// Append a field row to the current class.
    ///
    /// # Errors
    /// Returns an error if no class has been added yet, the slot count is wrong, or
    /// the (base name, type) pair repeats within the class.
    pub fn add_field(&mut self, descriptor: &str, names: Vec<NameSlot>) -> Result<()> {
        self.check_width(&names)?;
        let class = self.current_class("field")?;

        if Self::member_exists(&class.fields, descriptor, &names) {
            return Err(malformed_error!(
                "Duplicate field '{}' ({})",
                names[0].as_cell(),
                descriptor
            ));
        }

        class.fields.push(MemberEntry {
            descriptor: descriptor.to_string(),
            names,
        });
        Ok(())
    }

    /// Append a method row to the current class.
    ///
    /// # Errors
    /// Returns an error if no class has been added yet, the slot count is wrong, or
    /// the (base name, signature) pair repeats within the class.
    pub fn add_method(&mut self, descriptor: &str, names: Vec<NameSlot>) -> Result<()> {
        self.check_width(&names)?;
        let class = self.current_class("method")?;

        if Self::member_exists(&class.methods, descriptor, &names) {
            return Err(malformed_error!(
                "Duplicate method '{}' ({})",
                names[0].as_cell(),
                descriptor
            ));
        }

        class.methods.push(MemberEntry {
            descriptor: descriptor.to_string(),
            names,
        });
        Ok(())
    }

    /// Finish building; the tree is immutable from here on.
    #[must_use]
    pub fn build(self) -> MappingTree {
        MappingTree {
            namespaces: self.namespaces,
            properties: self.properties,
            classes: self.classes,
        }
    }

    fn check_width(&self, names: &[NameSlot]) -> Result<()> {
        if names.len() != self.namespaces.len() {
            return Err(malformed_error!(
                "Entry names {} namespaces, table declares {}",
                names.len(),
                self.namespaces.len()
            ));
        }
        Ok(())
    }

    fn current_class(&mut self, kind: &str) -> Result<&mut ClassEntry> {
        self.classes
            .last_mut()
            .ok_or_else(|| malformed_error!("Encountered a {} entry before any class", kind))
    }

    fn member_exists(members: &[MemberEntry], descriptor: &str, names: &[NameSlot]) -> bool {
        members.iter().any(|member| {
            member.descriptor == descriptor && member.names[0].name() == names[0].name()
        })
    }
}
