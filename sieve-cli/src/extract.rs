//! Extract command implementation for the sieve CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use sieve_core::store::SqliteKvStore;
use sieve_core::{PointLayout, TagSelector};
use sieve_data::{
    DEFAULT_FLUSH_THRESHOLD_BYTES, ExtractionOptions, ExtractionReport, PbfSource,
    SelectiveIndexer,
};
use tracing::info;

use crate::{
    ARG_FLUSH_BYTES, ARG_OSM_PBF, ARG_POINT_LAYOUT, ARG_SELECT, ARG_STORE, CliError, ENV_OSM_PBF,
    ENV_SELECT, ENV_STORE,
};

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Scan an OSM PBF file three times and persist the selected \
                 composites, the polylines they reference and the points \
                 those polylines use into a key-value store. Values can come \
                 from CLI flags, configuration files, or environment \
                 variables.",
    about = "Extract selected composites into a key-value store"
)]
#[ortho_config(prefix = "SIEVE")]
pub(crate) struct ExtractArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(long = ARG_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Path to the SQLite store that receives the extracted records.
    #[arg(long = ARG_STORE, value_name = "path")]
    #[serde(default)]
    pub(crate) store: Option<Utf8PathBuf>,
    /// Bytes buffered before a write batch is flushed (default 64 MiB).
    #[arg(long = ARG_FLUSH_BYTES, value_name = "bytes")]
    #[serde(default)]
    pub(crate) flush_bytes: Option<usize>,
    /// Comma-separated `key` or `key=value` clauses selecting composites.
    #[arg(long = ARG_SELECT, value_name = "expr")]
    #[serde(default)]
    pub(crate) select: Option<String>,
    /// Point value layout: `latitude` (default) or `lat-lon`.
    #[arg(long = ARG_POINT_LAYOUT, value_name = "layout")]
    #[serde(default)]
    pub(crate) point_layout: Option<String>,
}

impl ExtractArgs {
    pub(crate) fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractConfig {
    /// Source PBF file.
    pub(crate) osm_pbf: Utf8PathBuf,
    /// Output store location.
    pub(crate) store: Utf8PathBuf,
    /// Batch flush threshold in bytes.
    pub(crate) flush_bytes: usize,
    /// Composite selection.
    pub(crate) selector: TagSelector,
    /// Persisted point layout.
    pub(crate) point_layout: PointLayout,
}

impl ExtractConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.osm_pbf, ARG_OSM_PBF)
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match sieve_fs::is_regular_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub(crate) fn options(&self) -> ExtractionOptions {
        ExtractionOptions::default()
            .with_flush_threshold(self.flush_bytes)
            .with_point_layout(self.point_layout)
    }
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        let osm_pbf = args.osm_pbf.ok_or(CliError::MissingArgument {
            field: ARG_OSM_PBF,
            env: ENV_OSM_PBF,
        })?;
        let store = args.store.ok_or(CliError::MissingArgument {
            field: ARG_STORE,
            env: ENV_STORE,
        })?;
        let expression = args.select.ok_or(CliError::MissingArgument {
            field: ARG_SELECT,
            env: ENV_SELECT,
        })?;
        let flush_bytes = match args.flush_bytes {
            None => DEFAULT_FLUSH_THRESHOLD_BYTES,
            Some(0) => {
                return Err(CliError::InvalidFlushThreshold {
                    field: ARG_FLUSH_BYTES,
                });
            }
            Some(bytes) => bytes,
        };
        let selector = expression
            .parse::<TagSelector>()
            .map_err(|source| CliError::InvalidSelection {
                field: ARG_SELECT,
                source,
            })?;
        let point_layout = args
            .point_layout
            .as_deref()
            .map_or(Ok(PointLayout::default()), str::parse)
            .map_err(|source| CliError::InvalidPointLayout {
                field: ARG_POINT_LAYOUT,
                source,
            })?;
        Ok(Self {
            osm_pbf,
            store,
            flush_bytes,
            selector,
            point_layout,
        })
    }
}

/// Merge configuration layers and check the source exists.
pub(crate) fn resolve_extract_config(args: ExtractArgs) -> Result<ExtractConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Run the three passes over the configured source into the configured store.
pub(crate) fn run_extract(config: &ExtractConfig) -> Result<ExtractionReport, CliError> {
    info!(
        source = %config.osm_pbf,
        store = %config.store,
        selection = %config.selector,
        layout = %config.point_layout,
        "starting extraction"
    );
    let source = PbfSource::new(config.osm_pbf.as_std_path());
    let report = SelectiveIndexer::new(&source, &config.selector)
        .with_options(config.options())
        .run(|| SqliteKvStore::open(&config.store))
        .map_err(|source| CliError::Extract {
            store: config.store.clone(),
            source,
        })?;
    let stats = &report.extraction;
    info!(
        masks = %report.masks,
        points = stats.persisted.points,
        polylines = stats.persisted.polylines,
        composites = stats.persisted.composites,
        failures = stats.failures.total(),
        batches = stats.batches,
        bytes = stats.bytes_written,
        "extraction finished"
    );
    Ok(report)
}
