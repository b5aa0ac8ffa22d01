//! Error types emitted by the sieve CLI.
//!
//! Messages describe only their own layer; the binary prints the `source`
//! chain beneath them.

use std::sync::Arc;

use camino::Utf8PathBuf;
use sieve_core::{ParsePointLayoutError, SelectorError};
use sieve_data::PipelineError;
use thiserror::Error;

/// Errors emitted by the sieve CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The batch flush threshold must be positive.
    #[error("{field} must be greater than zero")]
    InvalidFlushThreshold { field: &'static str },
    /// The selection expression could not be parsed.
    #[error("invalid {field} expression")]
    InvalidSelection {
        field: &'static str,
        #[source]
        source: SelectorError,
    },
    /// The point layout name is not recognised.
    #[error("invalid {field}")]
    InvalidPointLayout {
        field: &'static str,
        #[source]
        source: ParsePointLayoutError,
    },
    /// The extraction run failed.
    #[error("failed to extract into {store:?}")]
    Extract {
        store: Utf8PathBuf,
        #[source]
        source: PipelineError,
    },
}
