//! Identifier membership sets used to decide which elements survive
//! extraction.
//!
//! Planet-scale extracts track hundreds of millions of identifiers, so a
//! generic hash set is too heavy. [`IdMask`] stores them in a compressed
//! [`RoaringTreemap`]: dense runs (node IDs referenced by ways) cost about a
//! bit per ID, sparse ones (relation members scattered across the ID space)
//! a couple of bytes.
//!
//! [`MembershipMasks`] groups the four sets the passes populate. Passes 1
//! and 2 mutate it; [`MembershipMasks::freeze`] then produces a
//! [`FrozenMasks`] that exposes only read access and is shared with the
//! extraction consumer thread.

use std::fmt;

use roaring::RoaringTreemap;

/// Flipping the sign bit maps `i64` order onto `u64` order.
const SIGN_BIT: u64 = 1 << 63;

const fn to_key(id: i64) -> u64 {
    id.cast_unsigned() ^ SIGN_BIT
}

const fn from_key(key: u64) -> i64 {
    (key ^ SIGN_BIT).cast_signed()
}

/// A set of 64-bit identifiers with fast insert and lookup.
///
/// # Examples
/// ```
/// use sieve_core::IdMask;
///
/// let mut mask = IdMask::new();
/// assert!(mask.insert(42));
/// assert!(!mask.insert(42));
/// assert!(mask.contains(42));
/// assert!(!mask.contains(-42));
/// assert_eq!(mask.len(), 1);
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct IdMask {
    ids: RoaringTreemap,
}

impl Eq for IdMask {}

impl IdMask {
    /// Create an empty mask.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`, returning `true` when it was not already present.
    pub fn insert(&mut self, id: i64) -> bool {
        self.ids.insert(to_key(id))
    }

    /// Report whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(to_key(id))
    }

    /// Number of identifiers in the mask.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.ids.len()
    }

    /// Report whether the mask holds no identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Collect every identifier in ascending order.
    ///
    /// Intended for diagnostics and tests.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<i64> {
        self.ids.iter().map(from_key).collect()
    }
}

impl fmt::Debug for IdMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdMask").field("len", &self.len()).finish()
    }
}

impl Extend<i64> for IdMask {
    fn extend<T: IntoIterator<Item = i64>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl FromIterator<i64> for IdMask {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        let mut mask = Self::new();
        mask.extend(iter);
        mask
    }
}

/// Names one of the four membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskSet {
    /// Points referenced by some polyline.
    PointRefs,
    /// Points referenced directly by a selected or nested composite.
    DirectMembers,
    /// Polylines to keep.
    RetainedPolylines,
    /// Composites kept as top-level output.
    SelectedComposites,
}

/// Sizes of the four membership sets at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskCounts {
    /// Size of [`MaskSet::PointRefs`].
    pub point_refs: u64,
    /// Size of [`MaskSet::DirectMembers`].
    pub direct_members: u64,
    /// Size of [`MaskSet::RetainedPolylines`].
    pub retained_polylines: u64,
    /// Size of [`MaskSet::SelectedComposites`].
    pub selected_composites: u64,
}

impl fmt::Display for MaskCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "point_refs={} direct_members={} retained_polylines={} selected_composites={}",
            self.point_refs, self.direct_members, self.retained_polylines, self.selected_composites
        )
    }
}

/// The four membership sets, writable while passes 1 and 2 run.
///
/// Sets only grow: there is no removal operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipMasks {
    point_refs: IdMask,
    direct_members: IdMask,
    retained_polylines: IdMask,
    selected_composites: IdMask,
}

impl MembershipMasks {
    /// Create four empty sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently add `id` to `set`, returning `true` when it was new.
    pub fn add(&mut self, set: MaskSet, id: i64) -> bool {
        self.mask_mut(set).insert(id)
    }

    /// Report whether `id` belongs to `set`.
    #[must_use]
    pub fn has(&self, set: MaskSet, id: i64) -> bool {
        self.mask(set).contains(id)
    }

    /// Borrow one of the underlying sets.
    #[must_use]
    pub const fn mask(&self, set: MaskSet) -> &IdMask {
        match set {
            MaskSet::PointRefs => &self.point_refs,
            MaskSet::DirectMembers => &self.direct_members,
            MaskSet::RetainedPolylines => &self.retained_polylines,
            MaskSet::SelectedComposites => &self.selected_composites,
        }
    }

    const fn mask_mut(&mut self, set: MaskSet) -> &mut IdMask {
        match set {
            MaskSet::PointRefs => &mut self.point_refs,
            MaskSet::DirectMembers => &mut self.direct_members,
            MaskSet::RetainedPolylines => &mut self.retained_polylines,
            MaskSet::SelectedComposites => &mut self.selected_composites,
        }
    }

    /// Current size of every set.
    #[must_use]
    pub fn counts(&self) -> MaskCounts {
        MaskCounts {
            point_refs: self.point_refs.len(),
            direct_members: self.direct_members.len(),
            retained_polylines: self.retained_polylines.len(),
            selected_composites: self.selected_composites.len(),
        }
    }

    /// End the writable phase.
    #[must_use]
    pub const fn freeze(self) -> FrozenMasks {
        FrozenMasks { inner: self }
    }
}

/// Read-only membership sets consulted by the extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenMasks {
    inner: MembershipMasks,
}

impl FrozenMasks {
    /// Report whether `id` belongs to `set`.
    #[must_use]
    pub fn has(&self, set: MaskSet, id: i64) -> bool {
        self.inner.has(set, id)
    }

    /// Whether a point must be persisted: referenced by a polyline or
    /// directly by a composite.
    #[must_use]
    pub fn retains_point(&self, id: i64) -> bool {
        self.has(MaskSet::PointRefs, id) || self.has(MaskSet::DirectMembers, id)
    }

    /// Whether a polyline must be persisted.
    #[must_use]
    pub fn retains_polyline(&self, id: i64) -> bool {
        self.has(MaskSet::RetainedPolylines, id)
    }

    /// Whether a composite must be persisted.
    #[must_use]
    pub fn retains_composite(&self, id: i64) -> bool {
        self.has(MaskSet::SelectedComposites, id)
    }

    /// Borrow one of the underlying sets.
    #[must_use]
    pub const fn mask(&self, set: MaskSet) -> &IdMask {
        self.inner.mask(set)
    }

    /// Size of every set.
    #[must_use]
    pub fn counts(&self) -> MaskCounts {
        self.inner.counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::BTreeSet;

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(65_535)]
    #[case(65_536)]
    #[case(i64::MAX)]
    #[case(i64::MIN)]
    fn boundary_identifiers_round_trip(#[case] id: i64) {
        let mut mask = IdMask::new();
        assert!(mask.insert(id));
        assert!(mask.contains(id));
        assert!(!mask.contains(id.wrapping_add(1)));
        assert_eq!(mask.to_sorted_vec(), vec![id]);
    }

    #[rstest]
    fn negative_and_positive_ids_do_not_alias() {
        let mut mask = IdMask::new();
        mask.insert(-65_536);
        assert!(!mask.contains(0));
        assert!(!mask.contains(65_536));
    }

    #[rstest]
    fn contiguous_runs_are_counted_once() {
        let mut mask: IdMask = (0..10_000).collect();
        assert_eq!(mask.len(), 10_000);
        assert!(!mask.insert(9_999), "re-insert is a no-op");
        assert!(mask.contains(4_321));
        assert!(!mask.contains(10_000));
        assert_eq!(mask.to_sorted_vec().len(), 10_000);
    }

    #[rstest]
    fn sorted_output_follows_signed_order() {
        let mask: IdMask = [5, -3, i64::MIN, 0, i64::MAX, -1].into_iter().collect();
        assert_eq!(mask.to_sorted_vec(), vec![i64::MIN, -3, -1, 0, 5, i64::MAX]);
    }

    #[rstest]
    fn sets_are_independent() {
        let mut masks = MembershipMasks::new();
        masks.add(MaskSet::PointRefs, 1);
        masks.add(MaskSet::RetainedPolylines, 100);
        assert!(masks.has(MaskSet::PointRefs, 1));
        assert!(!masks.has(MaskSet::DirectMembers, 1));
        assert!(!masks.has(MaskSet::PointRefs, 100));
        assert_eq!(
            masks.counts(),
            MaskCounts {
                point_refs: 1,
                direct_members: 0,
                retained_polylines: 1,
                selected_composites: 0,
            }
        );
    }

    #[rstest]
    fn frozen_points_honour_either_point_set() {
        let mut masks = MembershipMasks::new();
        masks.add(MaskSet::PointRefs, 1);
        masks.add(MaskSet::DirectMembers, 2);
        let frozen = masks.freeze();
        assert!(frozen.retains_point(1));
        assert!(frozen.retains_point(2));
        assert!(!frozen.retains_point(3));
        assert!(!frozen.retains_polyline(1));
    }

    proptest! {
        #[test]
        fn mask_matches_ordered_set_model(ids in proptest::collection::vec(any::<i64>(), 0..512)) {
            let model: BTreeSet<i64> = ids.iter().copied().collect();
            let mask: IdMask = ids.iter().copied().collect();
            prop_assert_eq!(mask.len(), u64::try_from(model.len()).unwrap_or(u64::MAX));
            prop_assert_eq!(mask.to_sorted_vec(), model.iter().copied().collect::<Vec<_>>());
            for id in &ids {
                prop_assert!(mask.contains(*id));
            }
        }

        #[test]
        fn clustered_ids_match_ordered_set_model(base in -1_000_000_i64..1_000_000, count in 0_usize..6_000) {
            let ids: Vec<i64> = (0..count)
                .map(|step| base.saturating_add(i64::try_from(step).unwrap_or(0).saturating_mul(3)))
                .collect();
            let model: BTreeSet<i64> = ids.iter().copied().collect();
            let mask: IdMask = ids.iter().copied().collect();
            prop_assert_eq!(mask.to_sorted_vec(), model.into_iter().collect::<Vec<_>>());
        }
    }
}
