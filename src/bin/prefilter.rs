//! prefilter: CLI tool for inspecting and updating pinned prefilter maps.

use clap::{Parser, Subcommand};
use ipnet::IpNet;
use prefilter::cidrmap::PinnedMapOpener;
use prefilter::{parse_cidr, PreFilter, PreFilterConfig};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prefilter")]
#[command(version = "0.1.0")]
#[command(about = "Manage XDP prefilter CIDR maps", long_about = None)]
struct Cli {
    /// YAML config file (defaults to an enabled prefilter)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory the maps are pinned under (overrides the config)
    #[arg(short, long, global = true)]
    pin_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all CIDRs in the prefilter maps
    List,

    /// Insert CIDRs into the prefilter
    Update {
        /// Expected revision (0 skips the check)
        #[arg(short, long, default_value_t = 0)]
        revision: u64,

        /// CIDRs or host addresses
        #[arg(required = true)]
        cidrs: Vec<String>,
    },

    /// Delete CIDRs from the prefilter
    Delete {
        /// Expected revision (0 skips the check)
        #[arg(short, long, default_value_t = 0)]
        revision: u64,

        /// CIDRs or host addresses
        #[arg(required = true)]
        cidrs: Vec<String>,
    },

    /// Write the datapath header definitions
    Config {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PreFilterConfig::load(path)?,
        None => PreFilterConfig::new(true),
    };
    if let Some(pin_dir) = cli.pin_dir {
        config.pin_dir = pin_dir;
    }

    match cli.command {
        Commands::List => list(&config),
        Commands::Update { revision, cidrs } => {
            let prefilter = PreFilter::open(&config)?;
            let revision = prefilter.insert(revision, &parse_all(&cidrs)?)?;
            println!("Inserted {} CIDRs, revision {}", cidrs.len(), revision);
            Ok(())
        }
        Commands::Delete { revision, cidrs } => {
            let prefilter = PreFilter::open(&config)?;
            let revision = prefilter.delete(revision, &parse_all(&cidrs)?)?;
            println!("Deleted {} CIDRs, revision {}", cidrs.len(), revision);
            Ok(())
        }
        Commands::Config { output } => write_config(&config, output),
    }
}

fn parse_all(cidrs: &[String]) -> prefilter::Result<Vec<IpNet>> {
    cidrs.iter().map(|s| parse_cidr(s)).collect()
}

fn list(config: &PreFilterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let prefilter = PreFilter::open(config)?;
    let (cidrs, revision) = prefilter.dump(Vec::new());

    println!("Revision: {}", revision);
    if cidrs.is_empty() {
        println!("No entries");
    }
    for cidr in &cidrs {
        println!("{}", cidr);
    }
    Ok(())
}

fn write_config(
    config: &PreFilterConfig,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Header emission needs no maps, so the prefilter is not started
    let prefilter = PreFilter::new(config, Box::new(PinnedMapOpener));
    match output {
        Some(path) => {
            let mut writer = io::BufWriter::new(fs::File::create(&path)?);
            prefilter.write_config(&mut writer)?;
            writer.flush()?;
            log::info!("Wrote prefilter config to {:?}", path);
        }
        None => prefilter.write_config(io::stdout().lock())?,
    }
    Ok(())
}
