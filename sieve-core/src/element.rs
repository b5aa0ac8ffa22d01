//! Decoded OSM-style entities and the record envelope persisted for them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form key/value attributes attached to polylines and composites.
///
/// Ordered so that serialized records are byte-for-byte deterministic.
pub type Tags = BTreeMap<String, String>;

/// Discriminant shared by decoded elements and composite members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    /// A single coordinate.
    Point,
    /// An ordered path of point references.
    Polyline,
    /// A relation grouping other elements.
    Composite,
}

impl ElementKind {
    /// Prefix prepended to the decimal identifier when persisting this kind.
    ///
    /// # Examples
    /// ```
    /// use sieve_core::ElementKind;
    ///
    /// assert_eq!(ElementKind::Point.key_prefix(), "");
    /// assert_eq!(ElementKind::Polyline.key_prefix(), "W");
    /// assert_eq!(ElementKind::Composite.key_prefix(), "R");
    /// ```
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Point => "",
            Self::Polyline => "W",
            Self::Composite => "R",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Point => "point",
            Self::Polyline => "polyline",
            Self::Composite => "composite",
        };
        f.write_str(label)
    }
}

/// Semantic tag carried by a composite member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Outer boundary, and the fallback for any unrecognised role.
    #[default]
    Outer,
    /// Inner boundary (a hole).
    Inner,
}

impl Role {
    /// Map a raw OSM member role onto the two supported roles.
    ///
    /// Only the literal `inner` maps to [`Role::Inner`].
    ///
    /// # Examples
    /// ```
    /// use sieve_core::Role;
    ///
    /// assert_eq!(Role::from_osm("inner"), Role::Inner);
    /// assert_eq!(Role::from_osm("outer"), Role::Outer);
    /// assert_eq!(Role::from_osm(""), Role::Outer);
    /// ```
    #[must_use]
    pub fn from_osm(role: &str) -> Self {
        if role == "inner" {
            Self::Inner
        } else {
            Self::Outer
        }
    }
}

/// An atomic coordinate in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unique point identifier.
    pub id: i64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Point {
    /// Construct a point from its identifier and coordinates.
    #[must_use]
    pub const fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self { id, lat, lon }
    }
}

/// An ordered path through previously declared points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polyline {
    /// Unique polyline identifier.
    pub id: i64,
    /// Point identifiers in path order.
    pub refs: Vec<i64>,
    /// Attributes attached to the polyline.
    pub tags: Tags,
}

impl Polyline {
    /// Construct an untagged polyline.
    #[must_use]
    pub fn new(id: i64, refs: Vec<i64>) -> Self {
        Self {
            id,
            refs,
            tags: Tags::new(),
        }
    }
}

/// A reference from a composite to another element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Kind of the referenced element.
    pub kind: ElementKind,
    /// Identifier of the referenced element.
    pub id: i64,
    /// Role the member plays inside the composite.
    pub role: Role,
}

impl Member {
    /// Construct a member reference.
    #[must_use]
    pub const fn new(kind: ElementKind, id: i64, role: Role) -> Self {
        Self { kind, id, role }
    }
}

/// An areal or relational entity built from ordered members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composite {
    /// Unique composite identifier.
    pub id: i64,
    /// Members in declaration order.
    pub members: Vec<Member>,
    /// Attributes attached to the composite.
    pub tags: Tags,
}

impl Composite {
    /// Construct an untagged composite.
    #[must_use]
    pub fn new(id: i64, members: Vec<Member>) -> Self {
        Self {
            id,
            members,
            tags: Tags::new(),
        }
    }

    /// Attach a tag, replacing any previous value for `key`.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Iterate over the identifiers of members of the given kind.
    pub fn member_ids(&self, kind: ElementKind) -> impl Iterator<Item = i64> + '_ {
        self.members
            .iter()
            .filter(move |member| member.kind == kind)
            .map(|member| member.id)
    }
}

/// A decoded element with exactly one active payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// A decoded point.
    Point(Point),
    /// A decoded polyline.
    Polyline(Polyline),
    /// A decoded composite.
    Composite(Composite),
}

impl Element {
    /// Identifier of the active payload.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Point(point) => point.id,
            Self::Polyline(polyline) => polyline.id,
            Self::Composite(composite) => composite.id,
        }
    }

    /// Discriminant of the active payload.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Point(_) => ElementKind::Point,
            Self::Polyline(_) => ElementKind::Polyline,
            Self::Composite(_) => ElementKind::Composite,
        }
    }
}

impl From<Point> for Element {
    fn from(point: Point) -> Self {
        Self::Point(point)
    }
}

impl From<Polyline> for Element {
    fn from(polyline: Polyline) -> Self {
        Self::Polyline(polyline)
    }
}

impl From<Composite> for Element {
    fn from(composite: Composite) -> Self {
        Self::Composite(composite)
    }
}

/// The unit persisted for polylines and composites.
///
/// `role` only carries meaning when the record is itself a resolved composite
/// member, and `children` is only populated for composites whose members have
/// been expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The wrapped element.
    pub element: Element,
    /// Role within a parent composite.
    pub role: Role,
    /// Resolved member records, in member order.
    pub children: Vec<Record>,
}

impl Record {
    /// Wrap an element with the default role and no children.
    #[must_use]
    pub fn new(element: impl Into<Element>) -> Self {
        Self {
            element: element.into(),
            role: Role::default(),
            children: Vec::new(),
        }
    }

    /// Replace the record's role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Replace the record's resolved children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }
}
