//! Wire formats for persisted values.
//!
//! Polyline and composite values are a one-byte schema version followed by
//! the `bincode` encoding of a [`Record`]. `bincode` writes enum variants as a
//! `u32` index followed by the variant's fields in declaration order, so the
//! layout is an explicit type tag plus fields. Adding a field or variant
//! requires bumping [`WIRE_VERSION`].
//!
//! Point values are raw IEEE-754 bit patterns chosen by [`PointLayout`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::element::{Point, Record};

/// Schema version written as the first byte of every encoded record.
pub const WIRE_VERSION: u8 = 1;

/// Errors raised while encoding or decoding persisted values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serializing a record failed.
    #[error("failed to encode record {id}")]
    Encode {
        /// Identifier of the record being encoded.
        id: i64,
        /// Source error from `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// Deserializing a record failed.
    #[error("failed to decode record payload")]
    Decode {
        /// Source error from `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The payload was empty.
    #[error("record payload is empty")]
    Empty,
    /// The payload was written with an unknown schema version.
    #[error("unsupported record wire version {found} (expected {WIRE_VERSION})")]
    UnsupportedVersion {
        /// Version byte found in the payload.
        found: u8,
    },
    /// A point value had an unexpected length for its layout.
    #[error("point value has {found} bytes, expected {expected}")]
    PointLength {
        /// Length of the supplied value.
        found: usize,
        /// Length required by the layout.
        expected: usize,
    },
}

/// Turns records into persisted bytes.
///
/// The extraction pass is generic over this trait so alternative encodings
/// can be injected.
pub trait RecordCodec {
    /// Encode `record` into an owned byte buffer.
    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError>;
}

/// The versioned `bincode` record codec.
///
/// # Examples
/// ```
/// use sieve_core::{ElementCodec, Polyline, Record, RecordCodec};
///
/// # fn main() -> Result<(), sieve_core::CodecError> {
/// let record = Record::new(Polyline::new(100, vec![1, 2]));
/// let bytes = ElementCodec.encode(&record)?;
/// assert_eq!(ElementCodec::decode(&bytes)?, record);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementCodec;

impl ElementCodec {
    /// Decode a payload produced by [`RecordCodec::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Record, CodecError> {
        let (version, payload) = bytes.split_first().ok_or(CodecError::Empty)?;
        if *version != WIRE_VERSION {
            return Err(CodecError::UnsupportedVersion { found: *version });
        }
        bincode::deserialize(payload).map_err(|source| CodecError::Decode { source })
    }
}

impl RecordCodec for ElementCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError> {
        let mut buffer = vec![WIRE_VERSION];
        bincode::serialize_into(&mut buffer, record).map_err(|source| CodecError::Encode {
            id: record.element.id(),
            source,
        })?;
        Ok(buffer)
    }
}

/// Byte layout used for persisted point values.
///
/// [`PointLayout::Latitude`] is the established index format: only the
/// latitude is stored. [`PointLayout::LatLon`] additionally appends the
/// longitude and must be requested explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointLayout {
    /// 8 bytes: big-endian latitude bits.
    #[default]
    Latitude,
    /// 16 bytes: big-endian latitude bits, then big-endian longitude bits.
    LatLon,
}

impl PointLayout {
    /// Number of bytes a point value occupies in this layout.
    #[must_use]
    pub const fn value_len(self) -> usize {
        match self {
            Self::Latitude => 8,
            Self::LatLon => 16,
        }
    }

    /// Encode the coordinates of `point`.
    ///
    /// # Examples
    /// ```
    /// use sieve_core::{Point, PointLayout};
    ///
    /// let value = PointLayout::Latitude.encode(&Point::new(1, 10.0, 99.0));
    /// assert_eq!(value, 10.0_f64.to_bits().to_be_bytes().to_vec());
    /// ```
    #[must_use]
    #[expect(
        clippy::big_endian_bytes,
        reason = "persisted point values are defined as big-endian IEEE-754 bits"
    )]
    pub fn encode(self, point: &Point) -> Vec<u8> {
        let mut value = Vec::with_capacity(self.value_len());
        value.extend_from_slice(&point.lat.to_bits().to_be_bytes());
        if self == Self::LatLon {
            value.extend_from_slice(&point.lon.to_bits().to_be_bytes());
        }
        value
    }

    /// Decode a point value into `(latitude, longitude)`.
    ///
    /// The longitude is `None` for [`PointLayout::Latitude`].
    #[expect(
        clippy::big_endian_bytes,
        reason = "persisted point values are defined as big-endian IEEE-754 bits"
    )]
    pub fn decode(self, value: &[u8]) -> Result<(f64, Option<f64>), CodecError> {
        let length_error = CodecError::PointLength {
            found: value.len(),
            expected: self.value_len(),
        };
        if value.len() != self.value_len() {
            return Err(length_error);
        }
        let (lat_bytes, rest) = value.split_first_chunk::<8>().ok_or(length_error)?;
        let lat = f64::from_bits(u64::from_be_bytes(*lat_bytes));
        let lon = rest
            .first_chunk::<8>()
            .map(|bytes| f64::from_bits(u64::from_be_bytes(*bytes)));
        Ok((lat, lon))
    }
}

impl fmt::Display for PointLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Latitude => "latitude",
            Self::LatLon => "lat-lon",
        })
    }
}

/// Error returned when a point layout name is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown point layout {0:?} (expected `latitude` or `lat-lon`)")]
pub struct ParsePointLayoutError(pub String);

impl FromStr for PointLayout {
    type Err = ParsePointLayoutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "latitude" => Ok(Self::Latitude),
            "lat-lon" => Ok(Self::LatLon),
            other => Err(ParsePointLayoutError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Composite, ElementKind, Member, Polyline, Role};
    use rstest::{fixture, rstest};

    #[fixture]
    fn nested_record() -> Record {
        let polyline = Polyline::new(100, vec![1, 2]);
        let composite = Composite::new(
            900,
            vec![Member::new(ElementKind::Polyline, 100, Role::Outer)],
        )
        .with_tag("type", "multipolygon");
        Record::new(composite).with_children(vec![Record::new(polyline).with_role(Role::Inner)])
    }

    #[rstest]
    fn nested_children_and_roles_survive(nested_record: Record) {
        let bytes = ElementCodec.encode(&nested_record).expect("encode record");
        assert_eq!(bytes.first(), Some(&WIRE_VERSION));
        let decoded = ElementCodec::decode(&bytes).expect("decode record");
        assert_eq!(decoded, nested_record);
        let child = decoded.children.first().expect("child record");
        assert_eq!(child.role, Role::Inner);
    }

    #[rstest]
    fn encoding_is_deterministic(nested_record: Record) {
        let first = ElementCodec.encode(&nested_record).expect("encode record");
        let second = ElementCodec
            .encode(&nested_record.clone())
            .expect("encode record");
        assert_eq!(first, second);
    }

    #[rstest]
    fn rejects_unknown_versions(nested_record: Record) {
        let mut bytes = ElementCodec.encode(&nested_record).expect("encode record");
        if let Some(version) = bytes.first_mut() {
            *version = WIRE_VERSION.wrapping_add(1);
        }
        let err = ElementCodec::decode(&bytes).expect_err("version mismatch");
        assert!(matches!(err, CodecError::UnsupportedVersion { found } if found == 2));
    }

    #[rstest]
    fn rejects_empty_and_truncated_payloads(nested_record: Record) {
        assert!(matches!(ElementCodec::decode(&[]), Err(CodecError::Empty)));
        let bytes = ElementCodec.encode(&nested_record).expect("encode record");
        let truncated = bytes.get(..bytes.len() - 3).expect("prefix");
        assert!(matches!(
            ElementCodec::decode(truncated),
            Err(CodecError::Decode { .. })
        ));
    }

    #[rstest]
    fn latitude_layout_omits_longitude() {
        let point = Point::new(1, 10.0, 20.0);
        let value = PointLayout::Latitude.encode(&point);
        assert_eq!(
            value,
            vec![0x40, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            "10.0 as big-endian IEEE-754"
        );
        assert_eq!(PointLayout::Latitude.decode(&value).expect("decode"), (10.0, None));
    }

    #[rstest]
    fn lat_lon_layout_appends_longitude() {
        let point = Point::new(1, -33.5, 151.25);
        let value = PointLayout::LatLon.encode(&point);
        assert_eq!(value.len(), 16);
        assert_eq!(
            PointLayout::LatLon.decode(&value).expect("decode"),
            (-33.5, Some(151.25))
        );
    }

    #[rstest]
    #[case(PointLayout::Latitude, 16)]
    #[case(PointLayout::LatLon, 8)]
    fn point_decode_checks_length(#[case] layout: PointLayout, #[case] len: usize) {
        let err = layout.decode(&vec![0; len]).expect_err("wrong length");
        assert!(matches!(err, CodecError::PointLength { found, .. } if found == len));
    }

    #[rstest]
    #[case("latitude", Ok(PointLayout::Latitude))]
    #[case("lat-lon", Ok(PointLayout::LatLon))]
    #[case("lon", Err(ParsePointLayoutError("lon".to_owned())))]
    fn parses_layout_names(
        #[case] raw: &str,
        #[case] expected: Result<PointLayout, ParsePointLayoutError>,
    ) {
        assert_eq!(raw.parse::<PointLayout>(), expected);
    }
}
