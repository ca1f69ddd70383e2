//! ipregion-gen: CLI tool for building and querying region database files.

use clap::{Parser, Subcommand, ValueEnum};
use ipregion::{DbReader, DbWriter, Region, SearchMode};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ipregion-gen")]
#[command(version = "0.1.0")]
#[command(about = "Build and query binary IP region databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a database from normalized range records
    ///
    /// Input lines: start|end|country|province|city|isp[|region_id|province_id|isp_id]
    /// sorted by start IP, non-overlapping. Blank lines and '#' comments are
    /// skipped.
    Build {
        /// Input text file of range records
        #[arg(short, long)]
        input: PathBuf,

        /// Output database file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Look up one or more IPs in a database
    Query {
        /// Database file
        #[arg(short, long)]
        db: PathBuf,

        /// Lookup strategy
        #[arg(short, long, value_enum, default_value_t = Mode::Btree)]
        mode: Mode,

        /// IPs to look up
        #[arg(required = true)]
        ips: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Memory,
    File,
    Btree,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Memory => SearchMode::Memory,
            Mode::File => SearchMode::File,
            Mode::Btree => SearchMode::Btree,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build { input, output } => build(&input, &output),
        Commands::Query { db, mode, ips } => query(&db, mode.into(), &ips),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build(input: &PathBuf, output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(input)?;
    let mut writer = DbWriter::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (start, end, region) = parse_line(line)
            .ok_or_else(|| format!("{}:{}: malformed record", input.display(), lineno + 1))?;
        writer.add_range(start, end, region)?;
    }

    writer.write_to(output)?;
    println!(
        "Built {} from {} ranges",
        output.display(),
        writer.range_count()
    );
    Ok(())
}

fn query(db: &PathBuf, mode: SearchMode, ips: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let reader = DbReader::open(db, mode)?;
    for ip in ips {
        match reader.lookup(ip) {
            Ok(region) => println!("{} -> {}", ip, region),
            Err(e) => println!("{} -> {}", ip, e),
        }
    }
    Ok(())
}

fn parse_line(line: &str) -> Option<(&str, &str, Region)> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < 6 {
        return None;
    }
    let mut region = Region::new(fields[2], fields[3], fields[4], fields[5]);
    if let Some(id) = fields.get(6) {
        region.region_id = id.parse().ok()?;
    }
    if let Some(id) = fields.get(7) {
        region.province_id = id.parse().ok()?;
    }
    if let Some(id) = fields.get(8) {
        region.isp_id = id.parse().ok()?;
    }
    Some((fields[0], fields[1], region))
}
