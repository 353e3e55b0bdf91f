use crate::{
    scan::{self, ScanMessage, ScanOutcome},
    store::{self, OverrideStore},
};
use anyhow::{bail, Context, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

enum CliCommand {
    Scan,
    Rename { appid: String, name: String },
    SetStatus { appid: String, installed: bool },
    ClearCache,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (format, tokens) = parse_format(&args);
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("PrefixHQ v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Scan => run_scan(format),
        CliCommand::Rename { appid, name } => rename(&appid, &name),
        CliCommand::SetStatus { appid, installed } => set_status(&appid, installed),
        CliCommand::ClearCache => clear_cache(),
    }
}

fn parse_format(args: &[String]) -> (OutputFormat, Vec<String>) {
    let mut format = OutputFormat::Text;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            if let Some(parsed) = OutputFormat::parse(value) {
                format = parsed;
            }
            continue;
        }
        if arg == "--format" {
            if let Some(value) = iter.next() {
                if let Some(parsed) = OutputFormat::parse(value) {
                    format = parsed;
                }
            }
            continue;
        }
        tokens.push(arg.clone());
    }
    (format, tokens)
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Scan);
    };
    match head.as_str() {
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        "--version" | "-V" | "version" => Ok(CliCommand::Version),
        "scan" => Ok(CliCommand::Scan),
        "rename" => {
            let (Some(appid), Some(name)) = (tokens.get(1), tokens.get(2)) else {
                bail!("rename requires <appid> <name>");
            };
            Ok(CliCommand::Rename {
                appid: appid.clone(),
                name: name.clone(),
            })
        }
        "set-status" => {
            let (Some(appid), Some(value)) = (tokens.get(1), tokens.get(2)) else {
                bail!("set-status requires <appid> <installed|orphaned>");
            };
            let installed = match value.as_str() {
                "installed" | "on" | "true" => true,
                "orphaned" | "off" | "false" => false,
                other => bail!("unknown status: {other}"),
            };
            Ok(CliCommand::SetStatus {
                appid: appid.clone(),
                installed,
            })
        }
        "clear-cache" => Ok(CliCommand::ClearCache),
        other => bail!("unknown command: {other} (see --help)"),
    }
}

fn run_scan(format: OutputFormat) -> Result<()> {
    let rx = scan::spawn_scan();
    loop {
        match rx.recv() {
            Ok(ScanMessage::Progress(message)) => {
                if format == OutputFormat::Text {
                    eprintln!("{message}...");
                }
            }
            Ok(ScanMessage::Finished(outcome)) => {
                match format {
                    OutputFormat::Text => print_inventory(&outcome),
                    OutputFormat::Json => {
                        let raw = serde_json::to_string_pretty(&outcome.records)
                            .context("serialize inventory")?;
                        println!("{raw}");
                    }
                }
                for warning in &outcome.warnings {
                    eprintln!("warning: {warning}");
                }
                return Ok(());
            }
            Ok(ScanMessage::Failed { error }) => bail!("scan failed: {error}"),
            Err(_) => bail!("scan worker exited unexpectedly"),
        }
    }
}

fn print_inventory(outcome: &ScanOutcome) {
    let installed = outcome.records.iter().filter(|r| r.installed).count();
    let orphaned = outcome.records.len() - installed;
    println!(
        "{} prefixes ({installed} installed, {orphaned} orphaned)",
        outcome.records.len()
    );
    let width = outcome
        .records
        .iter()
        .map(|record| record.appid.len())
        .max()
        .unwrap_or(0);
    for record in &outcome.records {
        let status = if record.installed { "installed" } else { "orphaned " };
        println!(
            "{:>width$}  {status}  {}  {}",
            record.appid,
            record.name,
            record.path.display(),
        );
    }
}

fn rename(appid: &str, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }
    let path = store::store_path()?;
    let mut store = OverrideStore::load(&path);
    store.custom_names.insert(appid.to_string(), name.to_string());
    store.save(&path)?;
    println!("Renamed {appid} to '{name}'");
    Ok(())
}

fn set_status(appid: &str, installed: bool) -> Result<()> {
    let path = store::store_path()?;
    let mut store = OverrideStore::load(&path);
    store.custom_status.insert(appid.to_string(), installed);
    store.save(&path)?;
    println!(
        "Marked {appid} as {}",
        if installed { "installed" } else { "orphaned" }
    );
    Ok(())
}

fn clear_cache() -> Result<()> {
    let path = store::store_path()?;
    let mut store = OverrideStore::load(&path);
    let dropped = store.api_cache.len();
    store.api_cache.clear();
    store.save(&path)?;
    println!("Cleared {dropped} cached name(s)");
    Ok(())
}

fn print_help() {
    println!("PrefixHQ - Proton prefix inventory for Steam on Linux");
    println!();
    println!("Usage: prefixhq [command] [--format text|json]");
    println!();
    println!("Commands:");
    println!("  scan                     Scan all libraries and print the inventory (default)");
    println!("  rename <appid> <name>    Set a custom display name");
    println!("  set-status <appid> <installed|orphaned>");
    println!("                           Override the installed status for a prefix");
    println!("  clear-cache              Drop cached store-API names");
    println!("  help                     Show this help");
    println!("  version                  Show the version");
}
