//! End-to-end resolution pipeline tests.
//!
//! Each test drives [`MappingsResolver`] against an in-memory fetcher serving
//! crafted mappings archives, with a throwaway cache root per test. The scenarios
//! cover the layout dispatch (legacy vs unmerged vs pre-merged), freshness reuse,
//! forced refresh, and the fatal version guard.

use std::{
    collections::HashMap,
    io::{Cursor, Read, Write},
    path::Path,
    sync::Mutex,
};

use remapkit::{prelude::*, resolve::TABLE_ENTRY_PATH, Error, Result};
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

/// Bundle a table into the archive layout resolution expects.
fn mappings_jar(table: &str) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buffer);
        writer
            .start_file(TABLE_ENTRY_PATH, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(table.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

/// In-memory artifact store with per-coordinate fetch counts.
struct FakeFetcher {
    artifacts: HashMap<Coordinate, Vec<u8>>,
    calls: Mutex<HashMap<Coordinate, usize>>,
}

impl FakeFetcher {
    fn new(artifacts: Vec<(Coordinate, Vec<u8>)>) -> FakeFetcher {
        FakeFetcher {
            artifacts: artifacts.into_iter().collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn fetches(&self, coordinate: &Coordinate) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(coordinate)
            .copied()
            .unwrap_or(0)
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, coordinate: &Coordinate) -> Result<Vec<u8>> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(coordinate.clone())
            .or_insert(0) += 1;
        self.artifacts
            .get(coordinate)
            .cloned()
            .ok_or_else(|| Error::NotFound(coordinate.to_string()))
    }
}

fn mappings_coordinate() -> Coordinate {
    Coordinate::new("net.example", "yarn", "1.16.5+build.7")
}

fn intermediary_coordinate() -> Coordinate {
    Coordinate::new("net.example", "intermediary", "1.16.5")
}

fn request<'a>(class_reader: Option<&'a dyn ClassReader>) -> MappingsRequest<'a> {
    MappingsRequest {
        mappings: mappings_coordinate(),
        intermediary: intermediary_coordinate(),
        runtime_version: "1.16.5".to_string(),
        class_reader,
        namespace_order: Some(vec![
            "official".to_string(),
            "intermediary".to_string(),
            "named".to_string(),
        ]),
    }
}

const UNMERGED_V2: &str = "tiny\t2\t0\tofficial\tnamed\n\
                           c\ta/A\tcom/example/Foo\n\
                           \tm\t()V\tb\trun\n\
                           c\ta/C\tcom/example/Baz\n";

const INTERMEDIARY_V2: &str = "tiny\t2\t0\tofficial\tintermediary\n\
                               c\ta/A\tnet/i/class_1\n\
                               \tm\t()V\tb\tmethod_1\n\
                               c\ta/B\tnet/i/class_2\n";

fn merged_scenario_fetcher() -> FakeFetcher {
    FakeFetcher::new(vec![
        (mappings_coordinate(), mappings_jar(UNMERGED_V2)),
        (intermediary_coordinate(), mappings_jar(INTERMEDIARY_V2)),
    ])
}

struct OneGetter;

impl ClassReader for OneGetter {
    fn classes(&self) -> Vec<ClassShape> {
        vec![ClassShape {
            name: "a/A".to_string(),
            fields: vec![FieldShape {
                name: "b".to_string(),
                descriptor: "I".to_string(),
                getter: Some("m".to_string()),
                constant_name: None,
            }],
        }]
    }
}

#[test]
fn legacy_table_is_suggested_and_never_merged() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new(vec![(
        mappings_coordinate(),
        mappings_jar(
            "v1\tofficial\tnamed\n\
             CLASS\ta/A\tcom/example/Foo\n\
             FIELD\ta/A\tI\tb\t\n\
             METHOD\ta/A\t()I\tm\tgetCount\n",
        ),
    )]);

    let session = Session::new(root.path());
    let reader = OneGetter;
    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(Some(&reader)))
        .unwrap();

    assert_eq!(resolved.table.namespaces(), ["official", "named"]);
    assert_eq!(resolved.mappings_version, "1.16.5+build.7");
    assert_eq!(fetcher.fetches(&intermediary_coordinate()), 0);

    // The unnamed field picked up its getter-derived name
    let class = resolved.table.find_class(0, "a/A").unwrap();
    let field = class.fields.iter().find(|f| f.descriptor == "I").unwrap();
    assert_eq!(field.names[1].name(), Some("count"));

    // Persisted in the legacy format it arrived in
    let persisted = std::fs::read(&resolved.table_path).unwrap();
    assert!(persisted.starts_with(b"v1\t"));
}

#[test]
fn unmerged_table_is_completed_from_the_intermediary() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = merged_scenario_fetcher();

    let session = Session::new(root.path());
    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(None))
        .unwrap();

    assert_eq!(
        resolved.table.namespaces(),
        ["official", "intermediary", "named"]
    );
    assert_eq!(resolved.mappings_version, "1.16.5+build.7-v2");

    // Union of both inputs, each class exactly once
    assert_eq!(resolved.table.classes().len(), 3);
    let class = resolved.table.find_class(0, "a/A").unwrap();
    assert_eq!(class.names[1].name(), Some("net/i/class_1"));
    assert_eq!(class.names[2].name(), Some("com/example/Foo"));

    // One-sided entries survive with the missing side unmapped
    let only_intermediary = resolved.table.find_class(0, "a/B").unwrap();
    assert!(only_intermediary.names[2].is_unmapped());
    let only_named = resolved.table.find_class(0, "a/C").unwrap();
    assert!(only_named.names[1].is_unmapped());

    // Intermediate steps are persisted for inspection
    assert!(session.steps_dir().join("inverted-intermediary.tiny").exists());
    assert!(session.steps_dir().join("unordered-merged.tiny").exists());
}

#[test]
fn fresh_persisted_table_short_circuits_derivation() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = merged_scenario_fetcher();

    let first = {
        let session = Session::new(root.path());
        MappingsResolver::new(&session)
            .resolve(&fetcher, &request(None))
            .unwrap()
    };
    assert_eq!(fetcher.fetches(&intermediary_coordinate()), 1);

    // A later run over the same cache root trusts the persisted table
    let session = Session::new(root.path());
    let second = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(None))
        .unwrap();

    assert_eq!(fetcher.fetches(&intermediary_coordinate()), 1);
    assert_eq!(second.table_path, first.table_path);
    assert_eq!(second.table.fingerprint(), first.table.fingerprint());
}

#[test]
fn forced_refresh_rebuilds_despite_a_fresh_cache() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = merged_scenario_fetcher();

    {
        let session = Session::new(root.path());
        MappingsResolver::new(&session)
            .resolve(&fetcher, &request(None))
            .unwrap();
    }

    let session = Session::new(root.path()).with_refresh(true);
    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(None))
        .unwrap();

    // The companion table was re-obtained, not trusted from disk
    assert_eq!(fetcher.fetches(&intermediary_coordinate()), 2);
    assert_eq!(
        resolved.table.namespaces(),
        ["official", "intermediary", "named"]
    );
}

#[test]
fn corrupt_persisted_table_is_rederived() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = merged_scenario_fetcher();

    let first = {
        let session = Session::new(root.path());
        MappingsResolver::new(&session)
            .resolve(&fetcher, &request(None))
            .unwrap()
    };

    std::fs::write(&first.table_path, b"garbage, not a table").unwrap();

    let session = Session::new(root.path());
    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(None))
        .unwrap();

    assert_eq!(resolved.table.classes().len(), 3);
    let persisted = std::fs::read(&resolved.table_path).unwrap();
    assert!(persisted.starts_with(b"tiny\t2\t0\t"));
}

#[test]
fn package_carries_the_final_table_at_the_fixed_entry() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = merged_scenario_fetcher();

    let session = Session::new(root.path());
    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(None))
        .unwrap();

    let bytes = read_entry(&resolved.package_path);
    let repackaged = remapkit::codec::parse(&bytes).unwrap();
    assert_eq!(
        repackaged.namespaces(),
        ["official", "intermediary", "named"]
    );
}

#[test]
fn declared_runtime_mismatch_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = merged_scenario_fetcher();

    let session = Session::new(root.path());
    let mut mismatched = request(None);
    mismatched.runtime_version = "1.17".to_string();

    let result = MappingsResolver::new(&session).resolve(&fetcher, &mismatched);
    assert!(matches!(result, Err(Error::VersionMismatch { .. })));
    // Nothing was fetched or persisted
    assert_eq!(fetcher.fetches(&mappings_coordinate()), 0);
}

#[test]
fn suffixed_versions_do_not_declare_a_runtime() {
    let root = tempfile::tempdir().unwrap();
    // A hyphenated version that embeds no runtime at all
    let coordinate = Coordinate::new("com.example", "custom-mappings", "0.5-alpha");
    let fetcher = FakeFetcher::new(vec![(
        coordinate.clone(),
        mappings_jar(
            "v1\tofficial\tnamed\n\
             CLASS\ta/A\tcom/example/Foo\n",
        ),
    )]);

    let session = Session::new(root.path());
    let mut suffixed = request(None);
    suffixed.mappings = coordinate;

    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &suffixed)
        .unwrap();
    assert_eq!(resolved.table.namespaces(), ["official", "named"]);
    assert_eq!(resolved.mappings_version, "0.5-alpha");
}

#[test]
fn unfetchable_mappings_artifact_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new(Vec::new());

    let session = Session::new(root.path());
    let result = MappingsResolver::new(&session).resolve(&fetcher, &request(None));
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn premerged_table_skips_the_merge_stage() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new(vec![(
        mappings_coordinate(),
        mappings_jar(
            "tiny\t2\t0\tofficial\tintermediary\tnamed\n\
             c\ta/A\tnet/i/class_1\tcom/example/Foo\n",
        ),
    )]);

    let session = Session::new(root.path());
    let resolved = MappingsResolver::new(&session)
        .resolve(&fetcher, &request(None))
        .unwrap();

    assert_eq!(
        resolved.table.namespaces(),
        ["official", "intermediary", "named"]
    );
    assert_eq!(fetcher.fetches(&intermediary_coordinate()), 0);
}

fn read_entry(package: &Path) -> Vec<u8> {
    let file = std::fs::File::open(package).unwrap();
    let mut zip = ZipArchive::new(file).unwrap();
    let mut entry = zip.by_name(TABLE_ENTRY_PATH).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}
