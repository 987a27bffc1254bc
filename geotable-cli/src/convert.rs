//! Convert command implementation for the geotable CLI.

use std::num::NonZeroU64;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use geotable_core::{
    AttributeColumns, Classifier, ConversionOptions, DEFAULT_PROGRESS_INTERVAL, IndexSet,
    IndexStrategy, JobStats, RecordBuilder, ScanCoordinator, Unclassified, WGS84_SRID,
};
use geotable_data::{
    ClassificationScheme, CsvRecordSink, RunReport, load_attribute_columns, open_source,
    report_path,
};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ATTRIBUTE_MAP, ARG_CLASSIFICATION, ARG_INDEX, ARG_INPUTS, ARG_MEMORY_BUDGET,
    ARG_OUTPUT_DIR, ARG_PROGRESS_INTERVAL, ARG_SCRATCH_DIR, ARG_TARGET_SRID, CliError, ENV_INPUTS,
    ENV_OUTPUT_DIR,
};

/// Memory budget used to choose the index strategy when none is configured.
pub(crate) const DEFAULT_MEMORY_BUDGET_MIB: u64 = 2048;

const BYTES_PER_MIB: u64 = 1024 * 1024;
const TABLE_EXTENSION: &str = "csv";
const DEFAULT_STEM: &str = "output";
const INPUT_EXTENSIONS: [&str; 4] = ["bz2", "pbf", "osm", "xml"];

/// Reference index strategy requested on the command line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum IndexChoice {
    /// Pick per input from its size and the memory budget.
    #[default]
    Auto,
    /// Always keep indices in memory.
    Memory,
    /// Always keep indices in SQLite files under the scratch directory.
    Disk,
}

/// CLI arguments for the `convert` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Convert OpenStreetMap extracts into pipe-delimited tables of \
                 named, categorized records with WKT geometries. Each input \
                 produces <stem>.csv and <stem>_metadata.json in the output \
                 directory. Options can come from CLI flags, configuration \
                 files, or environment variables.",
    about = "Convert OSM XML or PBF files into tables"
)]
#[ortho_config(prefix = "GEOTABLE")]
pub(crate) struct ConvertArgs {
    /// OSM XML (`.osm`, `.xml`, `.bz2`) or PBF (`.pbf`) files to convert.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) inputs: Vec<Utf8PathBuf>,
    /// Directory receiving the tables and reports.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Directory for disk-backed indices; defaults to the output directory.
    #[arg(long = ARG_SCRATCH_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) scratch_dir: Option<Utf8PathBuf>,
    /// Classification scheme (`.yml`, `.yaml`, `.txt` or `.csv`).
    #[arg(long = ARG_CLASSIFICATION, value_name = "path")]
    #[serde(default)]
    pub(crate) classification: Option<Utf8PathBuf>,
    /// JSON map of extra attribute columns.
    #[arg(long = ARG_ATTRIBUTE_MAP, value_name = "path")]
    #[serde(default)]
    pub(crate) attribute_map: Option<Utf8PathBuf>,
    /// Reference index strategy.
    #[arg(long = ARG_INDEX, value_enum)]
    #[serde(default)]
    pub(crate) index: Option<IndexChoice>,
    /// Memory budget in MiB for automatic index selection.
    #[arg(long = ARG_MEMORY_BUDGET, value_name = "MiB")]
    #[serde(default)]
    pub(crate) memory_budget_mib: Option<u64>,
    /// Records between two progress log lines.
    #[arg(long = ARG_PROGRESS_INTERVAL, value_name = "records")]
    #[serde(default)]
    pub(crate) progress_interval: Option<u64>,
    /// EPSG code of the output coordinates; only 4326 is supported.
    #[arg(long = ARG_TARGET_SRID, value_name = "epsg")]
    #[serde(default)]
    pub(crate) target_srid: Option<u32>,
}

impl ConvertArgs {
    pub(crate) fn into_config(self) -> Result<ConvertConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ConvertConfig::try_from(merged)
    }
}

/// Resolved `convert` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConvertConfig {
    /// Input files, converted one after another.
    pub(crate) inputs: Vec<Utf8PathBuf>,
    /// Directory receiving the tables and reports.
    pub(crate) output_dir: Utf8PathBuf,
    /// Parent directory of per-job index directories.
    pub(crate) scratch_dir: Utf8PathBuf,
    /// Optional classification scheme.
    pub(crate) classification: Option<Utf8PathBuf>,
    /// Optional attribute column map.
    pub(crate) attribute_map: Option<Utf8PathBuf>,
    /// Requested index strategy.
    pub(crate) index: IndexChoice,
    /// Memory budget in bytes.
    pub(crate) memory_budget_bytes: u64,
    /// Records between two progress log lines.
    pub(crate) progress_interval: NonZeroU64,
}

impl ConvertConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        for input in &self.inputs {
            Self::require_existing(input, ARG_INPUTS)?;
        }
        if let Some(path) = &self.classification {
            Self::require_existing(path, ARG_CLASSIFICATION)?;
        }
        if let Some(path) = &self.attribute_map {
            Self::require_existing(path, ARG_ATTRIBUTE_MAP)?;
        }
        Self::require_directory_or_absent(&self.output_dir)?;
        Self::require_directory_or_absent(&self.scratch_dir)
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match geotable_fs::file_is_file(path) {
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

    fn require_directory_or_absent(path: &Utf8Path) -> Result<(), CliError> {
        match geotable_fs::file_is_file(path) {
            Ok(true) => Err(CliError::OutputDirectoryNotDirectory {
                path: path.to_path_buf(),
            }),
            _ => Ok(()),
        }
    }

    fn choose_strategy(&self, input: &Utf8Path) -> Result<IndexStrategy, CliError> {
        match self.index {
            IndexChoice::Memory => Ok(IndexStrategy::InMemory),
            IndexChoice::Disk => Ok(IndexStrategy::Disk),
            IndexChoice::Auto => {
                let size = geotable_fs::file_len(input).map_err(|source| {
                    CliError::InspectSourcePath {
                        field: ARG_INPUTS,
                        path: input.to_path_buf(),
                        source,
                    }
                })?;
                let strategy = IndexStrategy::select(size, self.memory_budget_bytes);
                info!(
                    "Selected {strategy} indices for {input} ({size} bytes, budget {} bytes)",
                    self.memory_budget_bytes
                );
                Ok(strategy)
            }
        }
    }
}

impl TryFrom<ConvertArgs> for ConvertConfig {
    type Error = CliError;

    fn try_from(args: ConvertArgs) -> Result<Self, Self::Error> {
        if args.inputs.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_INPUTS,
                env: ENV_INPUTS,
            });
        }
        let output_dir = args.output_dir.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT_DIR,
            env: ENV_OUTPUT_DIR,
        })?;
        if let Some(srid) = args.target_srid.filter(|&srid| srid != WGS84_SRID) {
            return Err(CliError::UnsupportedSrid { srid });
        }
        let progress_interval =
            NonZeroU64::new(args.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL)).ok_or(
                CliError::InvalidArgument {
                    field: ARG_PROGRESS_INTERVAL,
                    reason: "must be greater than zero",
                },
            )?;
        let memory_budget_bytes = args
            .memory_budget_mib
            .unwrap_or(DEFAULT_MEMORY_BUDGET_MIB)
            .checked_mul(BYTES_PER_MIB)
            .ok_or(CliError::InvalidArgument {
                field: ARG_MEMORY_BUDGET,
                reason: "exceeds the addressable range",
            })?;
        let scratch_dir = args.scratch_dir.unwrap_or_else(|| output_dir.clone());

        Ok(Self {
            inputs: args.inputs,
            output_dir,
            scratch_dir,
            classification: args.classification,
            attribute_map: args.attribute_map,
            index: args.index.unwrap_or_default(),
            memory_budget_bytes,
            progress_interval,
        })
    }
}

/// Outcome of converting one input file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConversionSummary {
    /// Converted input.
    pub(crate) input: Utf8PathBuf,
    /// Written table.
    pub(crate) output: Utf8PathBuf,
    /// Written report.
    pub(crate) report: Utf8PathBuf,
    /// Index strategy used.
    pub(crate) strategy: IndexStrategy,
    /// Job counters.
    pub(crate) stats: JobStats,
}

pub(crate) fn run_convert(args: ConvertArgs) -> Result<Vec<ConversionSummary>, CliError> {
    let config = resolve_convert_config(args)?;
    execute_convert(&config)
}

pub(crate) fn resolve_convert_config(args: ConvertArgs) -> Result<ConvertConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Convert every input of `config` in order, stopping at the first failure.
pub(crate) fn execute_convert(config: &ConvertConfig) -> Result<Vec<ConversionSummary>, CliError> {
    let scheme = config
        .classification
        .as_deref()
        .map(ClassificationScheme::load)
        .transpose()?;
    let columns = config
        .attribute_map
        .as_deref()
        .map(load_attribute_columns)
        .transpose()?
        .unwrap_or_default();
    for dir in [&config.output_dir, &config.scratch_dir] {
        geotable_fs::ensure_dir(dir).map_err(|source| CliError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;
    }
    config
        .inputs
        .iter()
        .map(|input| convert_input(config, input, scheme.as_ref(), &columns))
        .collect()
}

fn convert_input(
    config: &ConvertConfig,
    input: &Utf8Path,
    scheme: Option<&ClassificationScheme>,
    columns: &AttributeColumns,
) -> Result<ConversionSummary, CliError> {
    let started = Instant::now();
    let output = config
        .output_dir
        .join(output_stem(input))
        .with_extension(TABLE_EXTENSION);
    let strategy = config.choose_strategy(input)?;

    let mut source = open_source(input).map_err(|source| CliError::OpenSource {
        path: input.to_path_buf(),
        source,
    })?;
    let indices = IndexSet::open(strategy, config.scratch_dir.as_std_path()).map_err(|source| {
        CliError::OpenIndex {
            path: input.to_path_buf(),
            source,
        }
    })?;
    let mut sink =
        CsvRecordSink::create(&output, columns).map_err(|source| CliError::CreateOutput {
            path: output.clone(),
            source,
        })?;
    let classifier: Box<dyn Classifier> = match scheme {
        Some(scheme) => Box::new(scheme.clone()),
        None => Box::new(Unclassified),
    };
    let builder = RecordBuilder::new(classifier, columns.clone());
    let options = ConversionOptions {
        progress_interval: config.progress_interval,
    };

    let stats = ScanCoordinator::new(indices, builder, options)
        .run(source.as_mut(), &mut sink)
        .map_err(|source| CliError::Job {
            path: input.to_path_buf(),
            source: Box::new(source),
        })?;

    let report = report_path(&output);
    RunReport::new(input, &output, strategy, &stats, started.elapsed()).write(&report)?;
    info!(
        "Wrote {} records from {input} to {output} ({} rejected)",
        stats.records, stats.rejected
    );
    Ok(ConversionSummary {
        input: input.to_path_buf(),
        output,
        report,
        strategy,
        stats,
    })
}

/// File name of `input` without its OSM format extensions.
#[must_use]
pub(crate) fn output_stem(input: &Utf8Path) -> &str {
    let mut stem = input.file_name().unwrap_or(DEFAULT_STEM);
    while let Some((head, extension)) = stem.rsplit_once('.')
        && !head.is_empty()
        && INPUT_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known))
    {
        stem = head;
    }
    stem
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ConvertConfig, CliError> {
    let merged = ConvertArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ConvertConfig::try_from(merged)
}
