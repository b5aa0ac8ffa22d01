//! Predicates deciding which composites are extracted.
//!
//! Provides:
//! - the [`CompositeSelector`] trait, implemented for any
//!   `Fn(&Composite) -> bool` so callers can inject closures; and
//! - [`TagSelector`], a configuration-friendly selector matching tags.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::element::Composite;

/// Decides whether a composite is part of the requested output.
pub trait CompositeSelector {
    /// Return `true` when `composite` should be extracted.
    fn select(&self, composite: &Composite) -> bool;
}

impl<F> CompositeSelector for F
where
    F: Fn(&Composite) -> bool,
{
    fn select(&self, composite: &Composite) -> bool {
        self(composite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagClause {
    key: String,
    value: Option<String>,
}

impl TagClause {
    fn matches(&self, composite: &Composite) -> bool {
        match (&self.value, composite.tags.get(&self.key)) {
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
            (_, None) => false,
        }
    }
}

/// Selects composites carrying any of a list of tags.
///
/// Parsed from a comma-separated list of `key` or `key=value` clauses. A
/// bare key matches any value.
///
/// # Examples
/// ```
/// use sieve_core::{Composite, CompositeSelector, TagSelector};
///
/// # fn main() -> Result<(), sieve_core::SelectorError> {
/// let selector: TagSelector = "boundary=administrative,landuse".parse()?;
/// let boundary = Composite::new(1, Vec::new()).with_tag("boundary", "administrative");
/// let forest = Composite::new(2, Vec::new()).with_tag("landuse", "forest");
/// let route = Composite::new(3, Vec::new()).with_tag("type", "route");
/// assert!(selector.select(&boundary));
/// assert!(selector.select(&forest));
/// assert!(!selector.select(&route));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelector {
    clauses: Vec<TagClause>,
}

/// Errors raised when parsing a [`TagSelector`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// The expression contained no clauses.
    #[error("selection expression is empty")]
    Empty,
    /// A clause had no key.
    #[error("selection clause {clause:?} has an empty key")]
    EmptyKey {
        /// The offending clause.
        clause: String,
    },
}

impl FromStr for TagSelector {
    type Err = SelectorError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let clauses = expression
            .split(',')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        if clauses.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self { clauses })
    }
}

fn parse_clause(clause: &str) -> Result<TagClause, SelectorError> {
    let (key, value) = match clause.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim().to_owned())),
        None => (clause, None),
    };
    if key.is_empty() {
        return Err(SelectorError::EmptyKey {
            clause: clause.to_owned(),
        });
    }
    Ok(TagClause {
        key: key.to_owned(),
        value,
    })
}

impl CompositeSelector for TagSelector {
    fn select(&self, composite: &Composite) -> bool {
        self.clauses.iter().any(|clause| clause.matches(composite))
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, clause) in self.clauses.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            match &clause.value {
                Some(value) => write!(f, "{}={value}", clause.key)?,
                None => f.write_str(&clause.key)?,
            }
        }
        Ok(())
    }
}
