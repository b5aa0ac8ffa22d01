//! Shared test harness modules for the sieve CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;
use crate::extract::ExtractConfig;

mod helpers;
