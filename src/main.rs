//! gRPC Stub Matcher - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use grpc_stub_matcher::config::GlobalSettings;
use grpc_stub_matcher::runtime::LiveStubs;
use grpc_stub_matcher::watch::StubFileWatcher;
use grpc_stub_matcher::{CallContext, Matcher, MetadataMap, Resolution, StubsConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "grpc-stub-matcher",
    about = "Match gRPC calls against stub definitions",
    version
)]
struct Args {
    /// Path to stub file
    #[arg(short, long, default_value = "stubs.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Validate stub file and exit
    #[arg(long)]
    validate: bool,

    /// Fully-qualified method of a call to match
    #[arg(long, requires = "payload")]
    method: Option<String>,

    /// Serialized request payload of the call
    #[arg(long, requires = "method")]
    payload: Option<String>,

    /// Call metadata as key=value (repeatable)
    #[arg(long = "metadata", value_name = "KEY=VALUE", value_parser = MetadataMap::parse_pair)]
    metadata: Vec<(String, String)>,

    /// Read calls as JSON lines from stdin, reloading the stub file on change
    #[arg(long, conflicts_with = "method")]
    watch: bool,
}

/// One call read from stdin in watch mode.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CallLine {
    method: String,
    payload: String,
    #[serde(default)]
    metadata: Option<HashMap<String, Vec<String>>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load stubs
    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading stubs");
        StubsConfig::from_file(&args.config)?
    } else if args.validate || args.watch {
        anyhow::bail!("Stub file not found: {:?}", args.config);
    } else {
        info!("Using empty configuration (no stubs)");
        StubsConfig::default()
    };

    if args.validate {
        println!("Stub file is valid ({} stubs defined)", config.stubs.len());
        return Ok(());
    }

    let live = Arc::new(LiveStubs::from_config(&config));

    if args.watch {
        // Reload outcomes are logged by the watcher; only the latest is kept.
        let (_watcher, _) = StubFileWatcher::new(&args.config, live.clone()).run()?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CallLine>(&line) {
                Ok(call) => {
                    let ctx = match &call.metadata {
                        Some(headers) => {
                            CallContext::with_metadata(MetadataMap::from_headers(headers))
                        }
                        None => CallContext::empty(),
                    };
                    report(
                        &live.settings(),
                        live.matcher(),
                        &ctx,
                        &call.method,
                        &call.payload,
                    )?;
                }
                Err(e) => warn!(error = %e, "Ignoring malformed call line"),
            }
        }
        return Ok(());
    }

    let (Some(method), Some(payload)) = (args.method, args.payload) else {
        println!(
            "{} stubs loaded; pass --method and --payload to match a call",
            config.stubs.len()
        );
        return Ok(());
    };

    let ctx = if args.metadata.is_empty() {
        CallContext::empty()
    } else {
        CallContext::with_metadata(MetadataMap::from_pairs(args.metadata))
    };
    report(&live.settings(), live.matcher(), &ctx, &method, &payload)
}

/// Match one call and print the outcome as JSON.
fn report(
    settings: &GlobalSettings,
    matcher: &Matcher,
    ctx: &CallContext,
    method: &str,
    payload: &str,
) -> Result<()> {
    let output = match matcher.resolve(ctx, method, payload) {
        Resolution::Matched(stub) => {
            if settings.log_matches {
                info!(stub_id = stub.label(), method = %method, "Call matched stub");
            }
            serde_json::json!({ "matched": true, "stub": &*stub })
        }
        Resolution::Unmatched(status) => {
            if settings.log_unmatched {
                warn!(method = %method, status = %status, "No matching stub found");
            }
            serde_json::json!({ "matched": false, "status": status })
        }
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
