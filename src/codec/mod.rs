//! Mapping table codec - format detection, parsing and serialization.
//!
//! Two wire formats coexist in the toolchain this crate serves:
//!
//! - The legacy layout (`v1`): a flat line-per-entry format where member rows carry
//!   their owning class and descriptor inline. Handled by [`v1`].
//! - The versioned layout (`tiny` 2.0): a multi-namespace format with a metadata
//!   header, optional header properties and indented member rows. Handled by [`v2`].
//!
//! [`detect_version`] inspects only a bounded prefix (the metadata line), so callers
//! can branch between the layouts without a full parse. [`parse`] and [`serialize`]
//! are pure functions over byte buffers; all I/O lives with the caller.
//!
//! # Round-trip contract
//!
//! For any tree `t` produced by [`parse`], `parse(serialize(t)) == t` - entry order,
//! names, properties and unmapped sentinels are preserved. Serializing a tree twice
//! yields identical bytes. [`serialize`] always emits the versioned layout;
//! [`serialize_legacy`] emits the legacy layout for tables that remain in it.

mod v1;
mod v2;

use crate::{tree::MappingTree, Error, Result};

/// Bound on how much of the input version detection may inspect.
const DETECT_PREFIX_LIMIT: usize = 4096;

/// The wire format of a raw mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// Legacy single-header layout (`v1`)
    TinyV1,
    /// Versioned multi-namespace layout with metadata header (`tiny` 2.0)
    TinyV2,
}

/// Detect the wire format from the metadata line alone.
///
/// Reads at most the first line (bounded to [`DETECT_PREFIX_LIMIT`] bytes) and never
/// parses entries, so this is cheap to call on arbitrary candidate buffers.
///
/// # Errors
/// Returns [`Error::UnknownFormat`] if the prefix matches neither layout.
pub fn detect_version(data: &[u8]) -> Result<FormatVersion> {
    let prefix = &data[..data.len().min(DETECT_PREFIX_LIMIT)];
    let line = match prefix.iter().position(|&byte| byte == b'\n') {
        Some(end) => &prefix[..end],
        None => prefix,
    };

    let Ok(line) = std::str::from_utf8(line) else {
        return Err(Error::UnknownFormat);
    };

    if line.starts_with("v1\t") {
        return Ok(FormatVersion::TinyV1);
    }

    if line.starts_with("tiny\t2\t") {
        return Ok(FormatVersion::TinyV2);
    }

    Err(Error::UnknownFormat)
}

/// Parse a raw mapping table, dispatching on the detected format.
///
/// # Errors
/// Returns [`Error::UnknownFormat`] if the header matches no known layout, or
/// [`Error::Malformed`] if the contents violate the detected layout (inconsistent
/// namespace counts, member rows outside a class, duplicate identifiers).
pub fn parse(data: &[u8]) -> Result<MappingTree> {
    match detect_version(data)? {
        FormatVersion::TinyV1 => v1::parse(data),
        FormatVersion::TinyV2 => v2::parse(data),
    }
}

/// Serialize a tree in the versioned multi-namespace layout.
#[must_use]
pub fn serialize(tree: &MappingTree) -> Vec<u8> {
    v2::serialize(tree)
}

/// Serialize a tree in the legacy layout.
///
/// # Errors
/// Returns an error if a class is unmapped in the base namespace, since the legacy
/// layout keys member rows by the base-namespace class name.
pub fn serialize_legacy(tree: &MappingTree) -> Result<Vec<u8>> {
    v1::serialize(tree)
}

/// Escape a name cell for the versioned layout's `escaped-names` mode.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }

    out
}

/// Reverse of [`escape`].
fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            other => {
                return Err(malformed_error!(
                    "Invalid escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                ))
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_legacy_header() {
        let data = b"v1\tofficial\tnamed\nCLASS\ta/A\tcom/Foo\n";
        assert_eq!(detect_version(data).unwrap(), FormatVersion::TinyV1);
    }

    #[test]
    fn detects_versioned_header() {
        let data = b"tiny\t2\t0\tofficial\tintermediary\n";
        assert_eq!(detect_version(data).unwrap(), FormatVersion::TinyV2);
    }

    #[test]
    fn detection_reads_only_the_first_line() {
        // Garbage after the first newline must not affect detection
        let data = b"tiny\t2\t0\tofficial\tnamed\n\xff\xfe\xfd";
        assert_eq!(detect_version(data).unwrap(), FormatVersion::TinyV2);
    }

    #[test]
    fn rejects_unknown_prefixes() {
        assert!(matches!(
            detect_version(b"tsrg2 left right\n"),
            Err(Error::UnknownFormat)
        ));
        assert!(matches!(detect_version(b""), Err(Error::UnknownFormat)));
        assert!(matches!(
            detect_version(b"\xff\xff\xff"),
            Err(Error::UnknownFormat)
        ));
        // v2-looking magic with the wrong major version
        assert!(matches!(
            detect_version(b"tiny\t3\t0\ta\tb\n"),
            Err(Error::UnknownFormat)
        ));
    }

    #[test]
    fn escape_round_trip() {
        let raw = "weird\tname\nwith\\escapes\0";
        assert_eq!(unescape(&escape(raw)).unwrap(), raw);
        assert!(unescape("broken\\q").is_err());
        assert!(unescape("trailing\\").is_err());
    }
}
