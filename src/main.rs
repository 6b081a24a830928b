//! quorum-bridge CLI - drive the host bindings from a terminal
//!
//! Commands:
//!   quorum-bridge ops                  - List operations and their signatures
//!   quorum-bridge call <NAME> [ARG..]  - Make one call and print its outcome
//!   quorum-bridge run [--script FILE]  - Issue calls from JSON lines, print settlements

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quorum_bridge::abi::marshal_error;
use quorum_bridge::runtime::Settlement;
use quorum_bridge::{
    build_runtime, build_runtime_with_host_loop, BridgeConfig, Call, HostLoop, HostValue, LogControl,
    MemoryNode, Runtime,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

#[derive(Parser)]
#[command(name = "quorum-bridge")]
#[command(about = "Call quorum node operations through the host bindings", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered operations
    Ops,

    /// Call one operation and print its value or settlement
    Call {
        /// Operation name, e.g. GetGroups
        name: String,

        /// Arguments, parsed as JSON; anything that is not JSON is a string
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Read calls as JSON lines (`["Name", arg, ...]`) and print each
    /// settlement as it happens
    Run {
        /// Read calls from this file instead of stdin
        #[arg(long)]
        script: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = BridgeConfig::load(cli.config.as_deref())?;
    let logs = LogControl::init(&config.log_level, config.debug || cli.debug)?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if config.worker_threads > 0 {
        builder.worker_threads(config.worker_threads);
    }
    let tokio_rt = builder.enable_all().build().context("failed to build tokio runtime")?;

    let node = Arc::new(MemoryNode::new(config.node.clone()));
    let handle = tokio_rt.handle().clone();
    let policy = config.arity_policy;

    let (code, lifecycle) = match cli.command {
        Commands::Ops => {
            let (runtime, lifecycle) = build_runtime(node, logs, handle, policy);
            ops_command(&runtime);
            (ExitCode::SUCCESS, lifecycle)
        }
        Commands::Call { name, args } => {
            let (runtime, lifecycle) = build_runtime(node, logs, handle, policy);
            (tokio_rt.block_on(call_command(&runtime, &name, &args))?, lifecycle)
        }
        Commands::Run { script } => {
            let (runtime, host_loop, lifecycle) =
                build_runtime_with_host_loop(node, logs, handle, policy);
            tokio_rt.block_on(run_command(&runtime, host_loop, script))?;
            (ExitCode::SUCCESS, lifecycle)
        }
    };

    lifecycle.stop();
    Ok(code)
}

fn ops_command(runtime: &Runtime) {
    for descriptor in runtime.registry().iter() {
        let mode = if descriptor.is_async() { "async" } else { "sync" };
        println!("{:<28} {:<5} {}", descriptor.name(), mode, descriptor.signature());
    }
}

fn parse_arg(arg: &str) -> HostValue {
    serde_json::from_str(arg).unwrap_or_else(|_| HostValue::String(arg.to_string()))
}

async fn call_command(runtime: &Runtime, name: &str, args: &[String]) -> anyhow::Result<ExitCode> {
    let args: Vec<HostValue> = args.iter().map(|a| parse_arg(a)).collect();
    match runtime.call(name, &args).settle().await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let payload = HostValue::Object(marshal_error(&err));
            eprintln!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn settlement_line(settlement: Settlement) -> serde_json::Value {
    match settlement.outcome {
        Ok(payload) => serde_json::json!({
            "call_id": settlement.call_id,
            "operation": settlement.operation,
            "result": serde_json::Value::from(HostValue::Object(payload)),
        }),
        Err(err) => serde_json::json!({
            "call_id": settlement.call_id,
            "operation": settlement.operation,
            "error": serde_json::Value::from(HostValue::Object(marshal_error(&err))),
        }),
    }
}

/// Split a script line into an operation name and its arguments.
fn parse_line(line: &str) -> anyhow::Result<(String, Vec<HostValue>)> {
    let value: HostValue = serde_json::from_str(line).context("script line is not JSON")?;
    let items = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("script line must be a JSON array"))?;
    let (name, args) = items
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("script line is an empty array"))?;
    let name = name
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("operation name must be a string"))?;
    Ok((name.to_string(), args.to_vec()))
}

async fn run_command(runtime: &Runtime, mut host_loop: HostLoop, script: Option<PathBuf>) -> anyhow::Result<()> {
    let input: Box<dyn AsyncRead + Unpin + Send> = match &script {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();
    let mut input_open = true;
    let mut outstanding = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let (name, args) = match parse_line(line) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::warn!(%err, line, "skipping script line");
                        continue;
                    }
                };
                match runtime.call(&name, &args) {
                    Call::Immediate(value) => println!(
                        "{}",
                        serde_json::json!({ "operation": name, "value": serde_json::Value::from(value) })
                    ),
                    Call::Pending(_) => outstanding += 1,
                }
            }
            Some(settlement) = host_loop.next(), if outstanding > 0 => {
                outstanding -= 1;
                println!("{}", settlement_line(settlement));
            }
            else => break,
        }

        if !input_open && outstanding == 0 {
            break;
        }
    }
    Ok(())
}
