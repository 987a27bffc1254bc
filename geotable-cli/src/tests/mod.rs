//! Shared test harness modules for the geotable CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;
use crate::convert::{
    ConversionSummary, ConvertConfig, DEFAULT_MEMORY_BUDGET_MIB, IndexChoice,
    config_from_layers_for_test, execute_convert, output_stem, resolve_convert_config,
};

mod helpers;
