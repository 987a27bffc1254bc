//! Test helpers laying out a small extract, scheme and output directory.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

const EXTRACT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="45.4640" lon="9.1900"/>
  <node id="2" lat="45.4650" lon="9.1910"/>
  <node id="3" lat="45.4645" lon="9.1905">
    <tag k="name" v="Bar Magenta"/>
    <tag k="amenity" v="cafe"/>
    <tag k="phone" v="+39 02 805 3808"/>
  </node>
  <node id="4" lat="45.4600" lon="9.1800">
    <tag k="name" v="Fontanella"/>
    <tag k="amenity" v="drinking_water"/>
  </node>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="name" v="Via Dante"/>
    <tag k="highway" v="pedestrian"/>
  </way>
</osm>
"#;

const SCHEME: &str = "Food #amenity\n  Cafes #amenity=cafe\nStreets #highway\n  Pedestrian #highway=pedestrian\n";

const COLUMNS: &str = r#"[{"column": "phone", "tags": ["phone"]}]"#;

/// Temporary directory holding one extract, a scheme and an attribute map.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        fs::write(root.join("milan.osm"), EXTRACT).expect("write extract");
        fs::write(root.join("scheme.yml"), SCHEME).expect("write scheme");
        fs::write(root.join("columns.json"), COLUMNS).expect("write columns");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn extract(&self) -> Utf8PathBuf {
        self.root.join("milan.osm")
    }

    pub(super) fn scheme(&self) -> Utf8PathBuf {
        self.root.join("scheme.yml")
    }

    pub(super) fn columns(&self) -> Utf8PathBuf {
        self.root.join("columns.json")
    }

    pub(super) fn output_dir(&self) -> Utf8PathBuf {
        self.root.join("out")
    }

    /// Configuration converting the extract with the scheme and columns.
    pub(super) fn config(&self, index: IndexChoice) -> ConvertConfig {
        ConvertConfig {
            inputs: vec![self.extract()],
            output_dir: self.output_dir(),
            scratch_dir: self.output_dir(),
            classification: Some(self.scheme()),
            attribute_map: Some(self.columns()),
            index,
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET_MIB * 1024 * 1024,
            progress_interval: std::num::NonZeroU64::MIN,
        }
    }
}

/// Table rows of `path` split on the delimiter, header first.
pub(super) fn read_rows(path: &Utf8Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .expect("read table")
        .lines()
        .map(|line| line.split('|').map(str::to_owned).collect())
        .collect()
}
