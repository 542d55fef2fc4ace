use std::env;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use env_logger::Builder;
use failure::{Error, ResultExt};
use log::{debug, log_enabled, LevelFilter};
use repo_mirror::{Config, Driver};
use structopt::StructOpt;

fn main() {
    let args = Args::from_args();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);

        for cause in e.iter_causes() {
            eprintln!("\tCaused By: {}", cause);
        }

        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    initialize_logging(args)?;

    if args.example_config {
        println!("{}", Config::example().as_json()?);
        return Ok(());
    }

    let cfg = args.config()?;

    if log_enabled!(log::Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }

    let driver = Driver::with_config(cfg);
    driver.run(&args.backup_dir)?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
struct Args {
    #[structopt(
        short = "c",
        long = "config",
        env = "CONFIG_FILE",
        default_value = "~/.repo-mirror.json",
        help = "The configuration file to use."
    )]
    config_file: String,
    #[structopt(
        short = "d",
        long = "backup-dir",
        env = "BACKUP_DIR",
        default_value = ".",
        help = "The directory backups are saved under."
    )]
    backup_dir: PathBuf,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output (repeat for more verbosity)"
    )]
    verbosity: u64,
    #[structopt(
        long = "example-config",
        help = "Print an example config and immediately exit."
    )]
    example_config: bool,
}

impl Args {
    fn config(&self) -> Result<Config, Error> {
        let config_file =
            shellexpand::full(&self.config_file).context("Unable to expand wildcards")?;

        let cfg = Config::from_file(&*config_file).context("Couldn't load the config")?;

        Ok(cfg)
    }
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    let level = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    builder.filter(Some("repo_mirror"), level);

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.format(|out, record| {
        writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    builder.try_init()?;

    Ok(())
}
