//! rgomo-client: 標準入力から 1 行 1 コマンドを読み、エンジンの応手を JSON で出力する
//!
//! コマンド: `begin`（エンジン先手）、`stop`、`quit` / `end`、それ以外は着手（`h8` / `7,7`）。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use rgomo_engine::{EngineConfig, EngineError, EngineProcess, Move, PlayResult, ProtocolFactory};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a Gomocup engine over stdin/stdout", long_about = None)]
struct Args {
    /// Engine executable
    #[arg(long, required_unless_present = "config", conflicts_with = "config")]
    engine: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Protocol dialect (overrides the config file)
    #[arg(long)]
    dialect: Option<String>,

    #[arg(long)]
    board_size: Option<u32>,

    /// Time left for each answer in milliseconds
    #[arg(long, default_value_t = 5_000)]
    time_left: u64,

    #[arg(long)]
    ready_timeout_ms: Option<u64>,

    /// Extra engine option sent as `INFO KEY VALUE` (repeatable)
    #[arg(long = "info", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    info: Vec<(String, String)>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_key_value(text: &str) -> std::result::Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {text:?}")),
    }
}

/// 1 回の応手の出力行
#[derive(Serialize)]
struct Answer<'a> {
    #[serde(flatten)]
    result: &'a PlayResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    winrate: Option<f64>,
}

#[derive(Serialize)]
struct Failure {
    error: String,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .write_style(env_logger::WriteStyle::Never)
    .target(env_logger::Target::Stderr)
    .init();

    // stdout は JSON 専用。ログは stderr のみ。
    if let Err(e) = run(args) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match (&args.config, &args.engine) {
        (Some(path), _) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(engine)) => EngineConfig::new(engine),
        (None, None) => bail!("either --engine or --config is required"),
    };
    if let Some(dialect) = &args.dialect {
        config.dialect = dialect.clone();
    }
    if let Some(size) = args.board_size {
        config.board_size = size;
    }
    if let Some(ms) = args.ready_timeout_ms {
        config.ready_timeout_ms = ms;
    }
    for (key, value) in &args.info {
        config.options.insert(key.clone(), toml::Value::String(value.clone()));
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let mut engine = EngineProcess::start_with(&config, &ProtocolFactory::default())
        .with_context(|| format!("failed to start {}", config.path.display()))?;

    if !engine.handshake(&config).context("handshake failed")? {
        bail!("engine did not acknowledge START {}", config.board_size);
    }
    info!("engine ready (pid {}, board {})", engine.pid(), config.board_size);

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        let answer = match command.to_ascii_lowercase().as_str() {
            "quit" | "end" => break,
            "stop" => {
                engine.stop()?;
                continue;
            }
            "begin" => engine.begin(args.time_left),
            _ => match Move::parse(command) {
                Ok(mv) => engine.play(mv, args.time_left),
                Err(e) => Err(e),
            },
        };

        match answer {
            Ok(result) => {
                let winrate = result.telemetry().evaluation.as_ref().map(|ev| ev.winrate());
                serde_json::to_writer(&mut out, &Answer { result: &result, winrate })?;
            }
            Err(e @ (EngineError::Timeout { .. } | EngineError::InvalidMove(_))) => {
                warn!("{e}");
                serde_json::to_writer(&mut out, &Failure { error: e.to_string() })?;
            }
            Err(e) => return Err(e).context("engine request failed"),
        }
        writeln!(out)?;
        out.flush()?;
    }

    engine.terminate();
    Ok(())
}
