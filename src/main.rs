//! Pagelift - Main entry point
//!
//! Deploy a directory of static files in one command.

use anyhow::Result;
use clap::Parser;
use pagelift::{config::Config, manifest::Manifest, utils, DeployError, Deployer, DeploySummary};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to publish
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// API token (overrides config file and PAGELIFT_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Deploy to an existing site instead of creating a new one
    #[arg(long, value_name = "ID")]
    site_id: Option<String>,

    /// Print the manifest and exit without contacting the API
    #[arg(long)]
    dry_run: bool,

    /// Emit the result as a JSON object on stdout
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Assemble configuration
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            print_failure(args.json, &e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.clone());
    utils::logger::init(&log_level)?;

    tracing::info!("pagelift v{}", env!("CARGO_PKG_VERSION"));

    // Dry run stops after the manifest; no credential is needed for it
    if args.dry_run {
        let manifest = match Manifest::build(&args.dir) {
            Ok(manifest) => manifest,
            Err(e) => {
                print_failure(args.json, &e);
                std::process::exit(1);
            }
        };
        println!("{}", serde_json::to_string_pretty(&manifest.hashes())?);
        return Ok(());
    }

    // Stop uploads cleanly on Ctrl-C
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping uploads");
            interrupt.cancel();
        }
    });

    let deployer = match Deployer::with_cancel(config, cancel) {
        Ok(deployer) => deployer,
        Err(e) => {
            print_failure(args.json, &e);
            std::process::exit(1);
        }
    };

    tracing::info!("Publishing {}", args.dir.display());

    match deployer.deploy(&args.dir).await {
        Ok(summary) => print_summary(args.json, &summary)?,
        Err(e) => {
            print_failure(args.json, &e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Assemble the effective configuration: file, then environment, then
/// command-line flags, later sources winning.
fn build_config(args: &Args) -> pagelift::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Ok(token) = std::env::var("PAGELIFT_TOKEN") {
        config.auth.token = token;
    }
    if let Ok(site_id) = std::env::var("PAGELIFT_SITE_ID") {
        config.site.id = Some(site_id);
    }
    if let Ok(base_url) = std::env::var("PAGELIFT_API_BASE") {
        config.api.base_url = base_url;
    }

    if let Some(token) = &args.token {
        config.auth.token = token.clone();
    }
    if let Some(site_id) = &args.site_id {
        config.site.id = Some(site_id.clone());
    }

    Ok(config)
}

fn print_summary(json: bool, summary: &DeploySummary) -> Result<()> {
    if json {
        let mut payload = serde_json::to_value(summary)?;
        payload["success"] = serde_json::Value::Bool(true);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Deployed {} files ({} uploaded, {} unchanged) in {}s",
            summary.total_files,
            summary.uploaded_files,
            summary.skipped_files,
            summary.duration_secs
        );
        println!("Site:   {}", summary.site_id);
        println!("Deploy: {}", summary.deploy_id);
        println!("URL:    {}", summary.url);
    }
    Ok(())
}

/// Every failure exit goes through here so `--json` callers always get the
/// `{"error": ...}` object on stdout, whichever stage failed.
fn print_failure(json: bool, err: &DeployError) {
    if json {
        println!("{}", failure_payload(err));
    } else {
        eprintln!("Error: {}", err);
    }
}

fn failure_payload(err: &DeployError) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_config_surfaces_malformed_file_as_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [").unwrap();

        let args = Args::parse_from([
            "pagelift",
            "--config",
            file.path().to_str().unwrap(),
            "--json",
            "site",
        ]);

        let err = build_config(&args).unwrap_err();
        assert!(matches!(err, DeployError::Config(_)), "got {err:?}");
    }

    #[test]
    fn test_failure_payload_is_an_error_object() {
        let err = DeployError::Config("API token is missing".to_string());
        assert_eq!(
            failure_payload(&err),
            r#"{"error":"Configuration error: API token is missing"}"#
        );
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[auth]\ntoken = \"file-token\"\n\n[site]\nid = \"file-site\"\n"
        )
        .unwrap();

        let args = Args::parse_from([
            "pagelift",
            "--config",
            file.path().to_str().unwrap(),
            "--token",
            "flag-token",
            "--site-id",
            "flag-site",
            "site",
        ]);

        let config = build_config(&args).unwrap();
        assert_eq!(config.auth.token, "flag-token");
        assert_eq!(config.site.id.as_deref(), Some("flag-site"));
    }
}
