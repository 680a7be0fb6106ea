use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use fleetpulse_agent::queue::{DurableQueue, PartitionRead};
use std::env;
use std::path::PathBuf;

#[derive(Debug)]
enum Command {
    Status { json: bool },
    Show(NaiveDate),
}

#[derive(Debug)]
struct Config {
    storage_dir: PathBuf,
    command: Command,
}

enum CliAction {
    Run(Config),
    Help,
}

fn usage() {
    println!(
        "Usage:\n  fleetpulse-queue [options] <command>\n\nCommands:\n  status [--json]        list pending partitions with size and record count\n  show <YYYY-MM-DD>      print one partition's records as JSON\n\nOptions:\n  --dir <path>           storage directory (default: stored_metrics)\n  -h, --help             show this help"
    );
}

fn parse_cli() -> Result<CliAction> {
    let mut storage_dir = PathBuf::from("stored_metrics");
    let mut command = None;
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "--dir" => {
                storage_dir = PathBuf::from(next_value(&mut args, "--dir")?);
            }
            "status" => command = Some(Command::Status { json: false }),
            "--json" => match command {
                Some(Command::Status { ref mut json }) => *json = true,
                _ => bail!("--json only applies to status"),
            },
            "show" => {
                let value = next_value(&mut args, "show")?;
                let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                    .with_context(|| format!("invalid date: {value}"))?;
                command = Some(Command::Show(date));
            }
            _ => bail!("unknown argument: {arg}"),
        }
    }

    let command = command.ok_or_else(|| anyhow!("missing command (status | show <date>)"))?;
    Ok(CliAction::Run(Config {
        storage_dir,
        command,
    }))
}

fn next_value<I>(args: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}

fn main() -> Result<()> {
    match parse_cli()? {
        CliAction::Help => {
            usage();
            Ok(())
        }
        CliAction::Run(config) => run(config),
    }
}

fn run(config: Config) -> Result<()> {
    if !config.storage_dir.is_dir() {
        bail!("storage dir not found: {}", config.storage_dir.display());
    }
    let queue = DurableQueue::open(&config.storage_dir)?;

    match config.command {
        Command::Status { json } => {
            let stats = queue.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            if stats.is_empty() {
                println!("[queue] no pending partitions in {}", queue.dir().display());
                return Ok(());
            }
            let mut total = 0usize;
            for info in &stats {
                match info.records {
                    Some(n) => {
                        total += n;
                        println!("{}  {:>6} records  {:>10} bytes", info.date, n, info.size_bytes);
                    }
                    None => println!("{}  CORRUPT         {:>10} bytes", info.date, info.size_bytes),
                }
            }
            println!("[queue] partitions={} records={}", stats.len(), total);
        }
        Command::Show(date) => match queue.read_all(date)? {
            PartitionRead::Empty => println!("[queue] no records for {date}"),
            PartitionRead::Records(records) => {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            PartitionRead::Corrupt { reason } => bail!("partition {date} is corrupt: {reason}"),
        },
    }
    Ok(())
}
