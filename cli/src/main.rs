//! chainfeed CLI — follow Scorum chain events from the terminal.
//!
//! Usage:
//! ```bash
//! # Follow votes and comments from a given block
//! chainfeed follow --url https://testnet.scorum.work --from 2220447 --events vote,flag,comment,post
//!
//! # Show head and last irreversible block
//! chainfeed info --url https://testnet.scorum.work
//!
//! # List event type names accepted by --events
//! chainfeed events
//! ```

use std::env;
use std::process;

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chainfeed_core::{Block, ChainClient, EventType, ProviderBuilder, ProviderConfig};
use chainfeed_rpc::HttpChainClient;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    init_tracing(has_flag(&args[2..], "--json-logs"));

    let result = match args[1].as_str() {
        "follow" => cmd_follow(&args[2..]).await,
        "info" => cmd_info(&args[2..]).await,
        "events" => {
            cmd_events();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("chainfeed {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("chainfeed {}", env!("CARGO_PKG_VERSION"));
    println!("Follow reversible and irreversible Scorum chain events\n");
    println!("USAGE:");
    println!("    chainfeed <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    follow     Stream blocks and events from a node");
    println!("    info       Print head and last irreversible block");
    println!("    events     List event type names");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FOLLOW FLAGS:");
    println!("    --url <URL>                 Node JSON-RPC endpoint  [required]");
    println!("    --from <N>                  Last block already seen  [default: 0]");
    println!("    --irreversible-from <N>     Last irreversible block already seen  [default: --from]");
    println!("    --events <a,b,..>           Event types to deliver  [default: all but unknown]");
    println!("    --config <FILE>             JSON provider config; flags below override it");
    println!("    --sync-interval-ms <MS>     Poll interval at the head");
    println!("    --max-blocks <N>            Blocks per history request");
    println!("    --retry-timeout-ms <MS>     Sleep between failed node calls");
    println!("    --retry-limit <N>           Extra attempts per node call");
    println!("    --empty-blocks              Deliver blocks without matching events");
    println!("    --print                     Print every block as a JSON line on stdout");
    println!("    --json-logs                 Emit logs as JSON (filter with RUST_LOG)");
}

/// Install the global subscriber. Logs go to stderr so `--print` output stays clean.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn cmd_follow(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let from: u32 = parse_num(args, "--from")?.unwrap_or(0);
    let irreversible_from: u32 = parse_num(args, "--irreversible-from")?.unwrap_or(from);
    let event_types = match parse_flag(args, "--events") {
        Some(list) => parse_event_types(&list)?,
        None => EventType::ALL
            .into_iter()
            .filter(|ty| *ty != EventType::Unknown)
            .collect(),
    };
    let config = load_config(args)?;
    let print = has_flag(args, "--print");

    let client = HttpChainClient::default_for(&url)?;
    let provider = ProviderBuilder::from_config(config).build(client);

    let cancel = CancellationToken::new();
    let mut sub = provider.start_with_cancel(from, irreversible_from, event_types, cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            cancel.cancel();
        }
    });

    loop {
        tokio::select! {
            Some(err) = sub.errors.recv() => {
                return Err(anyhow::Error::new(err).context("provider stopped"));
            }
            Some(block) = sub.blocks.recv() => report("reversible", &block, print)?,
            Some(block) = sub.irreversible.recv() => report("irreversible", &block, print)?,
            else => break,
        }
    }

    let state = sub.handle.state();
    sub.handle.join().await.context("provider task panicked")?;
    tracing::info!(%state, "done");
    Ok(())
}

fn report(stream: &str, block: &Block, print: bool) -> Result<()> {
    tracing::info!(
        stream,
        block = block.block_num,
        events = block.events.len(),
        "{stream} block {} with {} events",
        block.block_num,
        block.events.len()
    );
    if print {
        let line = serde_json::json!({ "stream": stream, "block": block });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

async fn cmd_info(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let client = HttpChainClient::default_for(&url)?;

    let start = std::time::Instant::now();
    let props = client
        .chain_properties()
        .await
        .with_context(|| format!("get_chain_properties on {url}"))?;
    let latency = start.elapsed();

    println!("  Node:                  {url}");
    println!("  Head block:            {}", props.head_block_number);
    println!("  Last irreversible:     {}", props.last_irreversible_block_number);
    if let Some(time) = &props.time {
        println!("  Head time:             {time}");
    }
    if let Some(chain_id) = &props.chain_id {
        println!("  Chain id:              {chain_id}");
    }
    println!("  Latency:               {}ms", latency.as_millis());
    Ok(())
}

fn cmd_events() {
    println!("Event types:\n");
    for ty in EventType::ALL {
        println!("  {ty}");
    }
}

fn load_config(args: &[String]) -> Result<ProviderConfig> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            ProviderConfig::from_json(&raw).with_context(|| format!("parsing config {path}"))?
        }
        None => ProviderConfig::default(),
    };

    if let Some(ms) = parse_num(args, "--sync-interval-ms")? {
        config.sync_interval_ms = ms;
    }
    if let Some(n) = parse_num(args, "--max-blocks")? {
        config.blocks_history_max_limit = n;
    }
    if let Some(ms) = parse_num(args, "--retry-timeout-ms")? {
        config.retry_timeout_ms = ms;
    }
    if let Some(n) = parse_num(args, "--retry-limit")? {
        config.retry_limit = n;
    }
    if has_flag(args, "--empty-blocks") {
        config.provide_empty_blocks = true;
    }
    Ok(config)
}

fn parse_event_types(list: &str) -> Result<Vec<EventType>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EventType>().map_err(anyhow::Error::from))
        .collect()
}

fn parse_num<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match parse_flag(args, flag) {
        Some(v) => v
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {flag}: {v}")),
        None => Ok(None),
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
