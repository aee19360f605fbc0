//! Command-line entry point shared by the `retail-unify` binary.

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;
use rusqlite::Connection;

use crate::config::LoaderConfig;
use crate::constants::datasets;
use crate::ingestion::{Orchestrator, resolve_names};
use crate::metrics::RunSummary;
use crate::source::DatasetKind;

#[derive(Debug, Parser)]
#[command(
    name = "retail-unify",
    disable_help_subcommand = true,
    about = "Load public retail datasets into one unified SQLite schema",
    long_about = "Parse raw Abt-Buy, CIKM16, ESCI, and WDC Products files and upsert them into a unified relational schema with lineage.",
    after_help = "Raw directories resolve in order: per-dataset flag, RETAIL_UNIFY_<DATASET>_DIR, --raw-root / RETAIL_UNIFY_RAW_ROOT, then data/<dataset>."
)]
struct LoadCli {
    #[arg(long, value_name = "PATH", help = "SQLite database file (created when missing)")]
    db: PathBuf,
    #[arg(
        long = "load",
        value_name = "NAME",
        num_args = 1..,
        required = true,
        help = "Datasets to load: abt_buy, cikm16, esci, wdc"
    )]
    load: Vec<String>,
    #[arg(long = "raw-root", value_name = "PATH", help = "Directory holding one subdirectory per dataset")]
    raw_root: Option<PathBuf>,
    #[arg(long = "abt-dir", value_name = "PATH", help = "Raw directory override for abt_buy")]
    abt_dir: Option<PathBuf>,
    #[arg(long = "cikm-dir", value_name = "PATH", help = "Raw directory override for cikm16")]
    cikm_dir: Option<PathBuf>,
    #[arg(long = "esci-dir", value_name = "PATH", help = "Raw directory override for esci")]
    esci_dir: Option<PathBuf>,
    #[arg(long = "wdc-dir", value_name = "PATH", help = "Raw directory override for wdc")]
    wdc_dir: Option<PathBuf>,
    #[arg(long, help = "Parse datasets one at a time instead of in parallel")]
    sequential: bool,
}

impl LoadCli {
    fn config(&self) -> LoaderConfig {
        let mut config = LoaderConfig::default().with_parallel(!self.sequential);
        if let Some(root) = &self.raw_root {
            config = config.with_raw_root(root);
        }
        for (kind, dir) in [
            (DatasetKind::AbtBuy, &self.abt_dir),
            (DatasetKind::Cikm16, &self.cikm_dir),
            (DatasetKind::Esci, &self.esci_dir),
            (DatasetKind::Wdc, &self.wdc_dir),
        ] {
            if let Some(dir) = dir {
                config = config.with_dataset_dir(kind, dir);
            }
        }
        config
    }
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

/// Parse `args_iter` (without the program name), load the requested datasets,
/// and print a per-dataset summary.
///
/// Returns `Ok(None)` when help was printed. Failed datasets are reported in
/// the summary rather than as an `Err`.
pub fn run_load<I>(args_iter: I) -> Result<Option<RunSummary>, Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let args = std::iter::once("retail-unify".to_string()).chain(args_iter);
    let Some(cli) = parse_cli::<LoadCli, _>(args)? else {
        return Ok(None);
    };

    resolve_names(&cli.load).map_err(|err| {
        format!("{err}; known datasets: {}", datasets::ALL.join(", "))
    })?;

    if let Some(parent) = cli.db.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(&cli.db)?;
    let config = cli.config();
    let summary = Orchestrator::new(&mut conn, config)?.run(&cli.load)?;

    print!("{}", summary.render());
    if !summary.is_success() {
        eprintln!(
            "{} of {} dataset(s) failed",
            summary.failed().count(),
            summary.outcomes.len()
        );
    }
    Ok(Some(summary))
}
