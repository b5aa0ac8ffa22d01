//! Pass 2: expand selected composites into concrete membership.
//!
//! The nested closure of the selected composites is resolved up front from
//! the adjacency recorded by pass 1, using an explicit stack and a visited
//! set so cycles terminate and deep nesting cannot exhaust the call stack.
//! One forward scan then applies the members of every composite in that
//! closure: polylines to [`MaskSet::RetainedPolylines`] and points to
//! [`MaskSet::DirectMembers`]. Nested composites are not top-level output
//! and never join [`MaskSet::SelectedComposites`].

use std::ops::ControlFlow;

use log::{debug, info, warn};
use sieve_core::{
    Composite, ElementKind, ElementSink, ElementSource, IdMask, MaskSet, MembershipMasks, Point,
    Polyline, SourceError,
};

use crate::index::{Discovery, ExpansionPlan};

/// Counters describing one expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    /// Distinct nested composites reachable from the selection.
    pub nested: u64,
    /// Nested composites found in the scan and expanded.
    pub expanded: u64,
    /// Nested composites referenced but absent from the source.
    pub missing: u64,
}

/// Resolve every composite reachable from `roots` through nesting.
///
/// The result includes the roots themselves. Each composite is visited at
/// most once, so reference cycles terminate.
///
/// # Examples
/// ```
/// use sieve_core::IdMask;
/// use sieve_data::{discover_membership, resolve_nested};
/// use sieve_core::test_support::MemorySource;
/// use sieve_core::{Composite, ElementKind, Member, Role};
///
/// let a = Composite::new(1, vec![Member::new(ElementKind::Composite, 2, Role::Outer)]);
/// let b = Composite::new(2, vec![Member::new(ElementKind::Composite, 1, Role::Outer)]);
/// let discovery = discover_membership(&MemorySource::new([a, b]), &|_: &Composite| false)?;
/// let roots: IdMask = [1].into_iter().collect();
/// assert_eq!(resolve_nested(&roots, &discovery.plan).to_sorted_vec(), vec![1, 2]);
/// # Ok::<(), sieve_core::SourceError>(())
/// ```
#[must_use]
pub fn resolve_nested(roots: &IdMask, plan: &ExpansionPlan) -> IdMask {
    let mut visited = IdMask::new();
    let mut stack = roots.to_sorted_vec();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        stack.extend(
            plan.nested_in(id)
                .iter()
                .copied()
                .filter(|nested| !visited.contains(*nested)),
        );
    }
    visited
}

/// Sink applying the members of nested composites during pass 2.
#[derive(Debug)]
pub struct MembershipExpander<'a> {
    masks: &'a mut MembershipMasks,
    closure: IdMask,
    found: IdMask,
}

impl<'a> MembershipExpander<'a> {
    /// Prepare to expand `plan` into `masks`.
    ///
    /// Pending polylines are retained immediately; nested composites are
    /// resolved into a closure awaiting the scan.
    #[must_use]
    pub fn new(masks: &'a mut MembershipMasks, plan: &ExpansionPlan) -> Self {
        for id in plan.pending_polylines().to_sorted_vec() {
            masks.add(MaskSet::RetainedPolylines, id);
        }
        let closure = resolve_nested(plan.pending_composites(), plan);
        Self {
            masks,
            closure,
            found: IdMask::new(),
        }
    }

    /// Composites whose members this expansion applies.
    #[must_use]
    pub const fn closure(&self) -> &IdMask {
        &self.closure
    }

    /// Finish the pass, reporting nested composites never seen in the scan.
    #[must_use]
    pub fn finish(self) -> ExpansionStats {
        let mut missing = 0;
        for id in self.closure.to_sorted_vec() {
            if !self.found.contains(id) {
                warn!("Nested composite {id} is referenced but absent from the source");
                missing += 1;
            }
        }
        ExpansionStats {
            nested: self.closure.len(),
            expanded: self.found.len(),
            missing,
        }
    }
}

impl ElementSink for MembershipExpander<'_> {
    fn on_point(&mut self, _point: Point) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_polyline(&mut self, _polyline: Polyline) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_composite(&mut self, composite: Composite) -> ControlFlow<()> {
        if !self.closure.contains(composite.id) || !self.found.insert(composite.id) {
            return ControlFlow::Continue(());
        }
        for member in &composite.members {
            match member.kind {
                ElementKind::Point => {
                    self.masks.add(MaskSet::DirectMembers, member.id);
                }
                ElementKind::Polyline => {
                    self.masks.add(MaskSet::RetainedPolylines, member.id);
                }
                // Already part of the closure.
                ElementKind::Composite => {}
            }
        }
        ControlFlow::Continue(())
    }
}

/// Run pass 2 over `source`, completing `discovery.masks`.
///
/// # Errors
/// Returns the source's error when it cannot be opened or decoded.
pub fn expand_membership<Src>(
    source: &Src,
    discovery: &mut Discovery,
) -> Result<ExpansionStats, SourceError>
where
    Src: ElementSource + ?Sized,
{
    let Discovery { masks, plan, .. } = discovery;
    let mut expander = MembershipExpander::new(masks, plan);
    debug!(
        "Expanding {} nested composites from {}",
        expander.closure().len(),
        source.location()
    );
    source.parse(&mut expander)?;
    let stats = expander.finish();
    info!(
        "Expansion resolved {} of {} nested composites; masks now {}",
        stats.expanded,
        stats.nested,
        discovery.masks.counts()
    );
    Ok(stats)
}
