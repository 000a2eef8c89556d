//! `scanline`: move a file across an air gap as a stream of visual-code
//! frames.
//!
//! Frames are written one per line; a renderer turns each line into a QR
//! code. On the other side, whatever a scanner captured (any order, any
//! duplicates, gaps allowed) goes back in one per line.
//!
//! # Usage
//!
//! ```text
//! scanline encode data.json -o frames.txt               # planned set
//! scanline encode data.json -o frames.txt --count 400   # longer stream
//! scanline encode data.json -o frames.txt --compress    # lz4 first
//! scanline decode scans.txt -o data.json --decompress
//! scanline plan 48213                                   # k and planned count
//! scanline flatten data.json -o data.csv
//! ```

mod flatten;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use scanline_fountain::config::FountainConfig;
use scanline_fountain::receiver::{Ingest, Receiver};
use scanline_fountain::sender::Sender;
use scanline_fountain::splitter::block_count;
use scanline_fountain::transform::{self, PayloadTransform};
use scanline_fountain::wire::Framing;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "scanline",
    version,
    about = "Fountain-coded file transfer over visual codes"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into frames, one per line.
    Encode {
        input: PathBuf,

        /// Output frames file.
        #[arg(short, long)]
        output: PathBuf,

        /// Number of frames. Defaults to the planned count.
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Compress with lz4 before encoding.
        #[arg(long)]
        compress: bool,

        /// Override the configured framing.
        #[arg(long, value_parser = ["json", "compact"])]
        framing: Option<String>,
    },

    /// Decode scanned frames, one per line, back into the file.
    Decode {
        input: PathBuf,

        /// Output file.
        #[arg(short, long)]
        output: PathBuf,

        /// Decompress lz4 after decoding.
        #[arg(long)]
        decompress: bool,

        /// Print decoder statistics as JSON.
        #[arg(long)]
        stats: bool,
    },

    /// Show the block count and planned frame count for a payload size.
    Plan {
        /// Payload size in bytes.
        bytes: usize,
    },

    /// Flatten a JSON document into CSV.
    Flatten {
        input: PathBuf,

        /// Output CSV file.
        #[arg(short, long)]
        output: PathBuf,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode {
            input,
            output,
            count,
            compress,
            framing,
        } => {
            let mut config = config;
            if let Some(framing) = framing.as_deref() {
                config.framing = match framing {
                    "compact" => Framing::Compact,
                    _ => Framing::Json,
                };
            }
            encode(&config, &input, &output, count, compress)
        }
        Commands::Decode {
            input,
            output,
            decompress,
            stats,
        } => decode(&config, &input, &output, decompress, stats),
        Commands::Plan { bytes } => plan(&config, bytes),
        Commands::Flatten { input, output } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let doc: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", input.display()))?;
            let csv = flatten::to_csv(&doc);
            fs::write(&output, csv)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(output = %output.display(), "csv written");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<FountainConfig> {
    let Some(path) = path else {
        return Ok(FountainConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = FountainConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

// -----------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------

fn encode(
    config: &FountainConfig,
    input: &Path,
    output: &Path,
    count: Option<u32>,
    compress: bool,
) -> Result<()> {
    let raw = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let payload = if compress {
        let packed = transform::Lz4::default().forward(&raw)?;
        info!(before = raw.len(), after = packed.len(), "payload compressed");
        packed
    } else {
        raw
    };

    let sender = Sender::new(&payload, config).context("failed to start session")?;
    let total = count.unwrap_or(sender.planned_count());
    let mut lines = String::new();
    for id in 0..total {
        let frame = sender
            .frame(id)
            .with_context(|| format!("failed to render frame {id}"))?;
        lines.push_str(&frame.text);
        lines.push('\n');
    }
    fs::write(output, lines).with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        session_id = %sender.session().session_id,
        k = sender.session().k,
        frames = total,
        planned = sender.planned_count(),
        output = %output.display(),
        "frames written"
    );
    Ok(())
}

fn decode(
    config: &FountainConfig,
    input: &Path,
    output: &Path,
    decompress: bool,
    print_stats: bool,
) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let mut rx = Receiver::new(config);
    let mut dropped = 0usize;
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        if let Ingest::Dropped(_) = rx.receive(line) {
            dropped += 1;
        }
        if rx.is_complete() {
            break;
        }
    }
    if dropped > 0 {
        warn!(dropped, "some frames were dropped");
    }

    if print_stats {
        let report = serde_json::json!({
            "receiver": rx.stats(),
            "decoder": rx.decoder_stats(),
            "progress": rx.progress(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let Some(payload) = rx.payload() else {
        match rx.progress() {
            Some(p) => bail!(
                "transfer incomplete: {}/{} blocks resolved, missing {:?}",
                p.resolved,
                p.k,
                p.unresolved
            ),
            None => bail!("no usable frames in {}", input.display()),
        }
    };
    let bytes = payload.verify().context("decoded payload failed integrity check")?;

    let bytes = if decompress {
        transform::Lz4::default().inverse(bytes)?
    } else {
        bytes.to_vec()
    };
    fs::write(output, &bytes).with_context(|| format!("failed to write {}", output.display()))?;
    info!(bytes = bytes.len(), output = %output.display(), "payload restored");
    Ok(())
}

fn plan(config: &FountainConfig, bytes: usize) -> Result<()> {
    if bytes < config.min_payload_bytes {
        bail!(
            "{bytes} bytes is below the {}-byte fountain threshold",
            config.min_payload_bytes
        );
    }
    let k = block_count(bytes, config.block_size) as u32;
    let report = serde_json::json!({
        "bytes": bytes,
        "blockSize": config.block_size,
        "k": k,
        "factor": config.redundancy.factor(k),
        "planned": config.redundancy.plan_count(k),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
