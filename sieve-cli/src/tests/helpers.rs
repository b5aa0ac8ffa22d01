//! Test helpers for preparing extract command inputs on disk.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

#[derive(Debug)]
pub(super) struct DatasetFiles {
    _dir: TempDir,
    osm: Utf8PathBuf,
    store: Utf8PathBuf,
}

impl DatasetFiles {
    /// Create a temporary directory holding `contents` as the PBF input.
    pub(super) fn with_contents(contents: &[u8]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let osm = root.join("input.osm.pbf");
        fs::write(&osm, contents).expect("write dataset file");
        let store = root.join("out").join("index.sqlite");
        Self {
            _dir: dir,
            osm,
            store,
        }
    }

    pub(super) fn new() -> Self {
        Self::with_contents(b"")
    }

    pub(super) fn osm(&self) -> &Utf8Path {
        &self.osm
    }

    pub(super) fn store(&self) -> &Utf8Path {
        &self.store
    }
}
