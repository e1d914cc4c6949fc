//! hwtree - Main entry point
//!
//! Replays scan records into a device tree and prints the hardware report.

mod config;
mod host;

use anyhow::{Context, Result};
use clap::Parser;
use config::ReportFormat;
use host::HostSystem;
use hwtree_core::{Detached, DeviceNode, ScanRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "hwtree")]
#[command(about = "Hardware inventory tree builder and reporter")]
#[command(version)]
struct Args {
    /// Scan records to replay, in order (TOML, or JSON with a .json extension)
    records: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "hwtree.toml")]
    config: PathBuf,

    /// Report format, overrides the configuration
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Wrap top-level nodes in a list element
    #[arg(long)]
    list: bool,

    /// Redact serial numbers
    #[arg(long)]
    sanitize: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the default configuration and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Reports go to stdout, logs stay out of the way
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_default_config {
        print!("{}", config::default_config_toml()?);
        return Ok(());
    }

    info!("hwtree v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    if let Some(format) = args.format {
        config.output.format = format;
    }
    config.output.list |= args.list;
    config.output.sanitize |= args.sanitize;

    let host = HostSystem;
    let mut root = config.system.root_node();

    for path in &args.records {
        let record = load_record(path)?;
        let applied = record.apply(&mut root, &host);
        info!(path = %path.display(), devices = applied, "Scan record replayed");
    }

    root.assign_phys_ids();
    root.fix_inconsistencies(&Detached);
    debug!(children = count_nodes(&root) - 1, "Tree complete");

    let report = match config.output.format {
        ReportFormat::Xml => {
            let options = config
                .output
                .report_options(host::os_identification(), host::is_privileged());
            root.to_xml(&options)?
        }
        ReportFormat::Json => root.to_json()?,
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", report),
    }

    Ok(())
}

/// Read a scan record, picking the parser from the file extension
fn load_record(path: &Path) -> Result<ScanRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ScanRecord::from_json(&content),
        _ => ScanRecord::from_toml(&content),
    }
    .with_context(|| format!("Invalid scan record {}", path.display()))?;
    Ok(record)
}

fn count_nodes(node: &DeviceNode) -> usize {
    1 + node.children().iter().map(count_nodes).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_record_by_extension() {
        let temp_dir = TempDir::new().unwrap();

        let toml_path = temp_dir.path().join("scan.toml");
        std::fs::write(&toml_path, "[[device]]\nid = \"cpu\"\nclass = \"processor\"\n").unwrap();
        let record = load_record(&toml_path).unwrap();
        assert_eq!(record.devices.len(), 1);

        let json_path = temp_dir.path().join("scan.json");
        std::fs::write(&json_path, r#"{"device": [{"id": "eth0", "class": "network"}]}"#).unwrap();
        let record = load_record(&json_path).unwrap();
        assert_eq!(record.devices[0].id, "eth0");

        assert!(load_record(&temp_dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_count_nodes() {
        let mut root = DeviceNode::new("computer", hwtree_core::DeviceClass::System);
        root.add_child(DeviceNode::new("core", hwtree_core::DeviceClass::Bus))
            .add_child(DeviceNode::new("cpu", hwtree_core::DeviceClass::Processor));
        assert_eq!(count_nodes(&root), 3);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["hwtree", "--format", "json", "--sanitize", "a.toml", "b.json"]);
        assert_eq!(args.format, Some(ReportFormat::Json));
        assert!(args.sanitize);
        assert!(!args.list);
        assert_eq!(args.records.len(), 2);
        assert_eq!(args.config, PathBuf::from("hwtree.toml"));
    }
}
