//! Behavioural tests for tag-based composite selection.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use sieve_core::{Composite, CompositeSelector, SelectorError, TagSelector};
use std::cell::RefCell;

type Parsed = RefCell<Option<Result<TagSelector, SelectorError>>>;

#[fixture]
fn selection() -> Parsed {
    RefCell::new(None)
}

#[fixture]
fn verdicts() -> RefCell<Vec<bool>> {
    RefCell::new(Vec::new())
}

fn tagged(id: i64, key: &str, value: &str) -> Composite {
    Composite::new(id, Vec::new()).with_tag(key, value)
}

fn judge(parsed: &Parsed, candidates: &[Composite], into: &RefCell<Vec<bool>>) {
    let borrowed = parsed.borrow();
    let selector = borrowed
        .as_ref()
        .expect("selection given")
        .as_ref()
        .expect("selection parses");
    *into.borrow_mut() = candidates
        .iter()
        .map(|composite| selector.select(composite))
        .collect();
}

fn parse_into(parsed: &Parsed, expression: &str) {
    *parsed.borrow_mut() = Some(expression.parse());
}

#[given("the selection \"type=multipolygon, boundary=administrative\"")]
fn any_clause_selection(#[from(selection)] parsed: &Parsed) {
    parse_into(parsed, "type=multipolygon, boundary=administrative");
}

#[given("the selection \"building\"")]
fn bare_key_selection(#[from(selection)] parsed: &Parsed) {
    parse_into(parsed, "building");
}

#[given("the selection \"type=route, =multipolygon\"")]
fn keyless_selection(#[from(selection)] parsed: &Parsed) {
    parse_into(parsed, "type=route, =multipolygon");
}

#[when("I test a multipolygon, an administrative boundary and a route")]
fn test_mixed(#[from(selection)] parsed: &Parsed, #[from(verdicts)] out: &RefCell<Vec<bool>>) {
    let candidates = [
        tagged(1, "type", "multipolygon"),
        tagged(2, "boundary", "administrative"),
        tagged(3, "type", "route"),
    ];
    judge(parsed, &candidates, out);
}

#[when("I test a composite tagged building=yes and an untagged composite")]
fn test_bare_key(#[from(selection)] parsed: &Parsed, #[from(verdicts)] out: &RefCell<Vec<bool>>) {
    let candidates = [tagged(1, "building", "yes"), Composite::new(2, Vec::new())];
    judge(parsed, &candidates, out);
}

#[then("the multipolygon and the boundary are selected")]
fn first_two_selected(#[from(verdicts)] out: &RefCell<Vec<bool>>) {
    let borrowed = out.borrow();
    assert_eq!(borrowed.get(..2), Some([true, true].as_slice()));
}

#[then("the route is not selected")]
fn route_rejected(#[from(verdicts)] out: &RefCell<Vec<bool>>) {
    assert_eq!(out.borrow().get(2), Some(&false));
}

#[then("only the tagged composite is selected")]
fn only_tagged(#[from(verdicts)] out: &RefCell<Vec<bool>>) {
    assert_eq!(*out.borrow(), vec![true, false]);
}

#[then("the selection is rejected for an empty key")]
fn rejected(#[from(selection)] parsed: &Parsed) {
    let borrowed = parsed.borrow();
    let outcome = borrowed.as_ref().expect("selection given");
    assert!(
        matches!(outcome, Err(SelectorError::EmptyKey { clause }) if clause == "=multipolygon"),
        "unexpected outcome {outcome:?}"
    );
}

#[scenario(path = "tests/features/composite_selection.feature", index = 0)]
fn matching_any_clause(selection: Parsed, verdicts: RefCell<Vec<bool>>) {
    let _ = (selection, verdicts);
}

#[scenario(path = "tests/features/composite_selection.feature", index = 1)]
fn matching_a_bare_key(selection: Parsed, verdicts: RefCell<Vec<bool>>) {
    let _ = (selection, verdicts);
}

#[scenario(path = "tests/features/composite_selection.feature", index = 2)]
fn rejecting_a_keyless_clause(selection: Parsed, verdicts: RefCell<Vec<bool>>) {
    let _ = (selection, verdicts);
}
