//! Denormalizing exporter.
//!
//! Reads a normalized phototag database and writes a second database where
//! each photo row carries a single JSON `data` column mapping tag names to
//! confidence values, suitable for querying with SQLite's JSON functions.
//!
//! ## Usage
//!
//! ```bash
//! phototag-export photos.sqlite photos-json.sqlite
//! ```

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::info;

use phototag::db::Database;
use phototag::export::export_denormalized;
use phototag::logging;

fn main() -> Result<()> {
    let (verbosity, src, dest) = parse_args();

    logging::init(logging::level_for_verbosity(verbosity))?;

    if !src.exists() {
        bail!("source database {} does not exist", src.display());
    }

    let db = Database::open(&src)?;
    db.initialize()?;

    let written = export_denormalized(&db, &dest)?;
    info!(
        written,
        dest = %dest.display(),
        "export complete"
    );

    Ok(())
}

fn parse_args() -> (u8, PathBuf, PathBuf) {
    let args: Vec<String> = std::env::args().collect();

    let mut verbosity: u8 = 0;
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("phototag-export {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "-v" => verbosity += 1,
            "-vv" => verbosity += 2,
            "-vvv" => verbosity += 3,
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => positional.push(PathBuf::from(arg)),
        }
        i += 1;
    }

    if positional.len() != 2 {
        eprintln!("Error: expected SRC_DB and DEST_DB arguments");
        print_help();
        std::process::exit(1);
    }

    let dest = positional.remove(1);
    let src = positional.remove(0);
    (verbosity, src, dest)
}

fn print_help() {
    println!(
        r#"phototag-export - denormalize a phototag database into JSON rows

USAGE:
    phototag-export [OPTIONS] SRC_DB DEST_DB

OPTIONS:
    -v, -vv, -vvv       Increase log verbosity (warn, info, debug)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOTAG_LOG        Log filter (overrides -v)"#
    );
}
