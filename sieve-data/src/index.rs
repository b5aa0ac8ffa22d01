//! Pass 1: discover which composites are selected and what they reference.
//!
//! A single forward scan that:
//! - adds every polyline's point references to [`MaskSet::PointRefs`];
//! - applies the caller's [`CompositeSelector`] to every composite, adding
//!   matches to [`MaskSet::SelectedComposites`] and their point members to
//!   [`MaskSet::DirectMembers`];
//! - records the polyline and composite members of selected composites as
//!   pending targets for pass 2; and
//! - records, for every composite, which composites it nests, so pass 2 can
//!   resolve nesting regardless of file order.

use std::collections::HashMap;
use std::ops::ControlFlow;

use log::{debug, info};
use sieve_core::{
    Composite, CompositeSelector, ElementKind, ElementSink, ElementSource, IdMask, MaskSet,
    MembershipMasks, Point, Polyline, SourceError,
};

/// Targets left for pass 2 to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionPlan {
    pending_polylines: IdMask,
    pending_composites: IdMask,
    nested: HashMap<i64, Vec<i64>>,
}

impl ExpansionPlan {
    /// Polylines referenced directly by a selected composite.
    #[must_use]
    pub const fn pending_polylines(&self) -> &IdMask {
        &self.pending_polylines
    }

    /// Composites nested directly inside a selected composite.
    #[must_use]
    pub const fn pending_composites(&self) -> &IdMask {
        &self.pending_composites
    }

    /// Composite members of the composite `id`, in member order.
    ///
    /// Empty when the composite nests nothing or never appeared.
    #[must_use]
    pub fn nested_in(&self, id: i64) -> &[i64] {
        self.nested.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Number of composites that nest at least one other composite.
    #[must_use]
    pub fn nesting_composites(&self) -> usize {
        self.nested.len()
    }
}

/// Element counts observed by pass 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Points scanned.
    pub points: u64,
    /// Polylines scanned.
    pub polylines: u64,
    /// Composites scanned.
    pub composites: u64,
    /// Composites accepted by the selector.
    pub selected: u64,
}

/// Everything pass 1 hands to pass 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Membership sets populated so far.
    pub masks: MembershipMasks,
    /// Targets for pass 2.
    pub plan: ExpansionPlan,
    /// Scan counters.
    pub stats: DiscoveryStats,
}

/// Sink populating [`MembershipMasks`] during pass 1.
#[derive(Debug)]
pub struct MembershipIndexBuilder<'a, S: ?Sized> {
    selector: &'a S,
    discovery: Discovery,
}

impl<'a, S> MembershipIndexBuilder<'a, S>
where
    S: CompositeSelector + ?Sized,
{
    /// Start with empty sets and the given selector.
    #[must_use]
    pub fn new(selector: &'a S) -> Self {
        Self {
            selector,
            discovery: Discovery::default(),
        }
    }

    /// Membership sets populated so far.
    #[must_use]
    pub const fn masks(&self) -> &MembershipMasks {
        &self.discovery.masks
    }

    /// Finish the pass and release its results.
    #[must_use]
    pub fn finish(self) -> Discovery {
        self.discovery
    }

    fn record_nesting(&mut self, composite: &Composite) {
        let nested: Vec<i64> = composite.member_ids(ElementKind::Composite).collect();
        if !nested.is_empty() {
            self.discovery.plan.nested.insert(composite.id, nested);
        }
    }

    fn select(&mut self, composite: &Composite) {
        let Discovery { masks, plan, stats } = &mut self.discovery;
        masks.add(MaskSet::SelectedComposites, composite.id);
        stats.selected += 1;
        for member in &composite.members {
            match member.kind {
                ElementKind::Point => {
                    masks.add(MaskSet::DirectMembers, member.id);
                }
                ElementKind::Polyline => {
                    plan.pending_polylines.insert(member.id);
                }
                ElementKind::Composite => {
                    plan.pending_composites.insert(member.id);
                }
            }
        }
    }
}

impl<S> ElementSink for MembershipIndexBuilder<'_, S>
where
    S: CompositeSelector + ?Sized,
{
    fn on_point(&mut self, _point: Point) -> ControlFlow<()> {
        self.discovery.stats.points += 1;
        ControlFlow::Continue(())
    }

    fn on_polyline(&mut self, polyline: Polyline) -> ControlFlow<()> {
        self.discovery.stats.polylines += 1;
        for id in polyline.refs {
            self.discovery.masks.add(MaskSet::PointRefs, id);
        }
        ControlFlow::Continue(())
    }

    fn on_composite(&mut self, composite: Composite) -> ControlFlow<()> {
        self.discovery.stats.composites += 1;
        self.record_nesting(&composite);
        if self.selector.select(&composite) {
            self.select(&composite);
        }
        ControlFlow::Continue(())
    }
}

/// Run pass 1 over `source`.
///
/// # Errors
/// Returns the source's error when it cannot be opened or decoded. Partial
/// results are discarded.
///
/// # Examples
/// ```
/// use sieve_core::test_support::MemorySource;
/// use sieve_core::{Composite, ElementKind, MaskSet, Member, Role};
/// use sieve_data::discover_membership;
///
/// let source = MemorySource::new([Composite::new(
///     900,
///     vec![Member::new(ElementKind::Polyline, 100, Role::Outer)],
/// )]);
/// let discovery = discover_membership(&source, &|_: &Composite| true)?;
/// assert!(discovery.masks.has(MaskSet::SelectedComposites, 900));
/// assert!(discovery.plan.pending_polylines().contains(100));
/// # Ok::<(), sieve_core::SourceError>(())
/// ```
pub fn discover_membership<Src, Sel>(source: &Src, selector: &Sel) -> Result<Discovery, SourceError>
where
    Src: ElementSource + ?Sized,
    Sel: CompositeSelector + ?Sized,
{
    let location = source.location();
    debug!("Discovering membership in {location}");
    let mut builder = MembershipIndexBuilder::new(selector);
    source.parse(&mut builder)?;
    let discovery = builder.finish();
    let stats = discovery.stats;
    info!(
        "Discovery scanned {} points, {} polylines, {} composites in {location}; selected {}",
        stats.points, stats.polylines, stats.composites, stats.selected
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use sieve_core::test_support::MemorySource;
    use sieve_core::{Element, Member, Role, TagSelector};

    fn member(kind: ElementKind, id: i64) -> Member {
        Member::new(kind, id, Role::Outer)
    }

    fn is_boundary(composite: &Composite) -> bool {
        composite.tags.get("type").is_some_and(|value| value == "boundary")
    }

    #[fixture]
    fn dataset() -> Vec<Element> {
        vec![
            Point::new(1, 10.0, 1.0).into(),
            Point::new(2, 20.0, 2.0).into(),
            Point::new(3, 30.0, 3.0).into(),
            Polyline::new(100, vec![1, 2]).into(),
            Polyline::new(101, vec![2, 4]).into(),
            Composite::new(
                900,
                vec![
                    member(ElementKind::Polyline, 100),
                    member(ElementKind::Point, 3),
                    member(ElementKind::Composite, 901),
                ],
            )
            .with_tag("type", "boundary")
            .into(),
            Composite::new(901, vec![member(ElementKind::Polyline, 101)])
                .with_tag("type", "route")
                .into(),
        ]
    }

    #[rstest]
    fn every_polyline_contributes_point_refs(dataset: Vec<Element>) {
        let source = MemorySource::new(dataset);
        let discovery = discover_membership(&source, &|_: &Composite| false).expect("scan");
        assert_eq!(
            discovery.masks.mask(MaskSet::PointRefs).to_sorted_vec(),
            vec![1, 2, 4]
        );
        assert!(discovery.masks.mask(MaskSet::SelectedComposites).is_empty());
        assert!(discovery.plan.pending_polylines().is_empty());
    }

    #[rstest]
    fn selected_composites_seed_members(dataset: Vec<Element>) {
        let source = MemorySource::new(dataset);
        let discovery = discover_membership(&source, &is_boundary).expect("scan");

        let masks = &discovery.masks;
        assert_eq!(
            masks.mask(MaskSet::SelectedComposites).to_sorted_vec(),
            vec![900]
        );
        assert_eq!(masks.mask(MaskSet::DirectMembers).to_sorted_vec(), vec![3]);
        assert!(
            masks.mask(MaskSet::RetainedPolylines).is_empty(),
            "polylines are retained by pass 2"
        );
        assert_eq!(discovery.plan.pending_polylines().to_sorted_vec(), vec![100]);
        assert_eq!(discovery.plan.pending_composites().to_sorted_vec(), vec![901]);
        assert_eq!(
            discovery.stats,
            DiscoveryStats {
                points: 3,
                polylines: 2,
                composites: 2,
                selected: 1,
            }
        );
    }

    #[rstest]
    fn nesting_is_recorded_for_unselected_composites() {
        let source = MemorySource::new([
            Composite::new(
                7,
                vec![
                    member(ElementKind::Composite, 8),
                    member(ElementKind::Polyline, 1),
                    member(ElementKind::Composite, 9),
                ],
            ),
            Composite::new(8, vec![member(ElementKind::Point, 1)]),
        ]);
        let discovery = discover_membership(&source, &|_: &Composite| false).expect("scan");
        assert_eq!(discovery.plan.nested_in(7), &[8, 9]);
        assert!(discovery.plan.nested_in(8).is_empty());
        assert!(discovery.plan.nested_in(42).is_empty());
        assert_eq!(discovery.plan.nesting_composites(), 1);
    }

    #[rstest]
    fn tag_selectors_plug_in(dataset: Vec<Element>) {
        let selector: TagSelector = "type=route".parse().expect("valid selector");
        let discovery =
            discover_membership(&MemorySource::new(dataset), &selector).expect("scan");
        assert_eq!(
            discovery
                .masks
                .mask(MaskSet::SelectedComposites)
                .to_sorted_vec(),
            vec![901]
        );
        assert_eq!(discovery.plan.pending_polylines().to_sorted_vec(), vec![101]);
    }

    #[rstest]
    fn decode_failures_abort(dataset: Vec<Element>) {
        let source = MemorySource::new(dataset).failing_after(2);
        let err = discover_membership(&source, &is_boundary).expect_err("decode failure");
        assert!(matches!(err, SourceError::Decode { .. }));
    }
}
