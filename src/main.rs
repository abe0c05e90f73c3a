use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use phototag::config::{ApiCredentials, Config};
use phototag::db::Database;
use phototag::logging;
use phototag::scanner::Scanner;
use phototag::tagger::{ImaggaClient, TagQueue};

struct CliArgs {
    verbosity: u8,
    api_key: Option<String>,
    api_secret: Option<String>,
    credentials: Option<PathBuf>,
    database: Option<PathBuf>,
    limit: Option<usize>,
    config_path: Option<PathBuf>,
    topdir: PathBuf,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();

    let mut verbosity: u8 = 0;
    let mut api_key = None;
    let mut api_secret = None;
    let mut credentials = None;
    let mut database = None;
    let mut limit = None;
    let mut config_path = None;
    let mut topdir = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("phototag {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "-v" => verbosity += 1,
            "-vv" => verbosity += 2,
            "-vvv" => verbosity += 3,
            "--api-key" => {
                api_key = Some(require_value(&args, &mut i, "--api-key"));
            }
            "--api-secret" => {
                api_secret = Some(require_value(&args, &mut i, "--api-secret"));
            }
            "--credentials" | "-c" => {
                credentials = Some(PathBuf::from(require_value(&args, &mut i, "--credentials")));
            }
            "--database" | "-d" => {
                database = Some(PathBuf::from(require_value(&args, &mut i, "--database")));
            }
            "--limit" | "-l" => {
                let value = require_value(&args, &mut i, "--limit");
                match value.parse() {
                    Ok(n) => limit = Some(n),
                    Err(_) => {
                        eprintln!("Error: --limit expects a number, got {}", value);
                        std::process::exit(1);
                    }
                }
            }
            "--config" => {
                config_path = Some(PathBuf::from(require_value(&args, &mut i, "--config")));
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            arg => {
                if topdir.is_some() {
                    eprintln!("Unexpected extra argument: {}", arg);
                    print_help();
                    std::process::exit(1);
                }
                topdir = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    let topdir = match topdir {
        Some(dir) => dir,
        None => {
            eprintln!("Error: missing TOPDIR argument");
            print_help();
            std::process::exit(1);
        }
    };

    CliArgs {
        verbosity,
        api_key,
        api_secret,
        credentials,
        database,
        limit,
        config_path,
        topdir,
    }
}

fn require_value(args: &[String], i: &mut usize, flag: &str) -> String {
    if *i + 1 < args.len() {
        *i += 1;
        args[*i].clone()
    } else {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    }
}

fn print_help() {
    println!(
        r#"phototag - tag photos with a remote classification service

USAGE:
    phototag [OPTIONS] TOPDIR

OPTIONS:
    -v, -vv, -vvv           Increase log verbosity (warn, info, debug)
    --api-key KEY           Tagging API key
    --api-secret SECRET     Tagging API secret
    --credentials, -c FILE  JSON file with api_key and api_secret
    --database, -d PATH     SQLite database path (default: photos.sqlite)
    --limit, -l N           Tag at most N new images this run
    --config PATH           Path to config file
    --version, -V           Show version
    --help, -h              Show this help message

ENVIRONMENT:
    PHOTOTAG_LOG            Log filter (overrides -v)

Config file location: $XDG_CONFIG_HOME/phototag/config.toml

See also: phototag-export --help"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    logging::init(logging::level_for_verbosity(args.verbosity))?;

    // Load configuration, then layer CLI overrides on top
    let mut config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(api_key) = args.api_key {
        config.api.api_key = Some(api_key);
    }
    if let Some(api_secret) = args.api_secret {
        config.api.api_secret = Some(api_secret);
    }
    if let Some(ref path) = args.credentials {
        let creds = ApiCredentials::load(path)?;
        config.api.api_key = Some(creds.api_key);
        config.api.api_secret = Some(creds.api_secret);
    }

    // Fails fast when credentials are missing
    let client = ImaggaClient::from_config(&config.api)?;

    let db = Database::open(&config.database)?;
    db.initialize()?;
    info!(database = %config.database.display(), "database opened");

    let scanner = Scanner::new(&config.scanner);
    let untagged = scanner.find_untagged(&args.topdir, &db, args.limit)?;
    info!(count = untagged.len(), "images to tag");

    let mut queue = TagQueue::new(
        Box::new(client),
        Duration::from_millis(config.api.request_interval_ms),
    );
    queue.add_tasks(untagged);
    let summary = queue.process_all(&db);

    info!(
        tagged = summary.tagged,
        skipped = summary.skipped,
        failed = summary.failed,
        "run complete"
    );

    Ok(())
}
