//! OSM PBF adapter for the decoder boundary.
//!
//! Blobs are traversed sequentially so every pass observes elements in file
//! order from a single producer. A sink that breaks ends the scan before the
//! next element is decoded.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use osmpbf::{BlobDecode, BlobReader, Element as PbfElement, RelMember, RelMemberType};
use sieve_core::{
    Composite, ElementKind, ElementSink, ElementSource, Member, Point, Polyline, Role,
    SourceError, Tags,
};

/// Reads an `.osm.pbf` file from disk, once per pass.
///
/// # Examples
/// ```no_run
/// use std::ops::ControlFlow;
///
/// use sieve_core::{ElementSink, ElementSource, Composite, Point, Polyline};
/// use sieve_data::PbfSource;
///
/// struct Counter(u64);
///
/// impl Counter {
///     fn count(&mut self) -> ControlFlow<()> {
///         self.0 += 1;
///         ControlFlow::Continue(())
///     }
/// }
///
/// impl ElementSink for Counter {
///     fn on_point(&mut self, _point: Point) -> ControlFlow<()> { self.count() }
///     fn on_polyline(&mut self, _polyline: Polyline) -> ControlFlow<()> { self.count() }
///     fn on_composite(&mut self, _composite: Composite) -> ControlFlow<()> { self.count() }
/// }
///
/// # fn main() -> Result<(), sieve_core::SourceError> {
/// let source = PbfSource::new("planet.osm.pbf");
/// let mut counter = Counter(0);
/// source.parse(&mut counter)?;
/// println!("{} elements", counter.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbfSource {
    path: PathBuf,
}

impl PbfSource {
    /// Create a source reading from `path`. The file is opened lazily by
    /// every call to [`ElementSource::parse`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the PBF file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode_error(&self, source: osmpbf::Error) -> SourceError {
        SourceError::Decode {
            path: self.path.clone(),
            source: Box::new(source),
        }
    }
}

impl ElementSource for PbfSource {
    fn parse(&self, sink: &mut dyn ElementSink) -> Result<(), SourceError> {
        let reader = BlobReader::from_path(&self.path).map_err(|source| SourceError::Open {
            path: self.path.clone(),
            source: Box::new(source),
        })?;
        for entry in reader {
            let blob = entry.map_err(|err| self.decode_error(err))?;
            let BlobDecode::OsmData(block) = blob.decode().map_err(|err| self.decode_error(err))?
            else {
                // Header and unknown blobs carry no elements.
                continue;
            };
            for element in block.elements() {
                if forward(element, sink).is_break() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn forward(element: PbfElement<'_>, sink: &mut dyn ElementSink) -> ControlFlow<()> {
    match element {
        PbfElement::Node(node) => sink.on_point(Point::new(node.id(), node.lat(), node.lon())),
        PbfElement::DenseNode(node) => sink.on_point(Point::new(node.id(), node.lat(), node.lon())),
        PbfElement::Way(way) => sink.on_polyline(Polyline {
            id: way.id(),
            refs: way.refs().collect(),
            tags: collect_tags(way.tags()),
        }),
        PbfElement::Relation(relation) => sink.on_composite(Composite {
            id: relation.id(),
            members: relation.members().map(convert_member).collect(),
            tags: collect_tags(relation.tags()),
        }),
    }
}

fn convert_member(member: RelMember<'_>) -> Member {
    let kind = match member.member_type {
        RelMemberType::Node => ElementKind::Point,
        RelMemberType::Way => ElementKind::Polyline,
        RelMemberType::Relation => ElementKind::Composite,
    };
    // An undecodable role string degrades to the default role rather than
    // aborting the scan.
    let role = member.role().map_or(Role::Outer, Role::from_osm);
    Member::new(kind, member.member_id, role)
}

fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use sieve_core::Element;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[derive(Default)]
    struct Collect(Vec<Element>);

    impl Collect {
        fn push(&mut self, element: Element) -> ControlFlow<()> {
            self.0.push(element);
            ControlFlow::Continue(())
        }
    }

    impl ElementSink for Collect {
        fn on_point(&mut self, point: Point) -> ControlFlow<()> {
            self.push(point.into())
        }

        fn on_polyline(&mut self, polyline: Polyline) -> ControlFlow<()> {
            self.push(polyline.into())
        }

        fn on_composite(&mut self, composite: Composite) -> ControlFlow<()> {
            self.push(composite.into())
        }
    }

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    #[rstest]
    fn missing_files_fail_to_open(temp_dir: TempDir) {
        let missing = temp_dir.path().join("missing.osm.pbf");
        let source = PbfSource::new(&missing);
        let err = source
            .parse(&mut Collect::default())
            .expect_err("missing file should fail");
        match err {
            SourceError::Open { path, .. } => assert_eq!(path, missing),
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[rstest]
    fn corrupted_payloads_fail_to_decode() {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(b"\x00\x00\x00\x0dnot a pbf blob header")
            .expect("write garbage");
        file.flush().expect("flush garbage");
        let source = PbfSource::new(file.path());
        let mut sink = Collect::default();
        let err = source.parse(&mut sink).expect_err("garbage should fail");
        match err {
            SourceError::Decode { path, source: cause } => {
                assert_eq!(path, file.path());
                assert!(!cause.to_string().is_empty());
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert!(sink.0.is_empty(), "no elements decoded from garbage");
    }

    #[rstest]
    fn empty_files_yield_no_elements() {
        let file = NamedTempFile::new().expect("create temp file");
        let mut sink = Collect::default();
        PbfSource::new(file.path())
            .parse(&mut sink)
            .expect("empty file is an empty dataset");
        assert!(sink.0.is_empty());
    }

    #[rstest]
    fn tags_are_collected_in_key_order() {
        let tags = collect_tags([("type", "multipolygon"), ("name", "Lake")]);
        let keys: Vec<&str> = tags.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "type"]);
    }

    #[rstest]
    fn location_reports_the_path() {
        let source = PbfSource::new("/data/planet.osm.pbf");
        assert_eq!(source.location(), "/data/planet.osm.pbf");
        assert_eq!(source.path(), Path::new("/data/planet.osm.pbf"));
    }
}
