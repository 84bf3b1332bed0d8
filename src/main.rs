//! pxi_daq command-line tool
//!
//! Inspect and load digital waveforms described as JSON files:
//!
//! ```text
//! pxi_daq compress pulse.json
//! pxi_daq decompress pulse.json --layout group-by-channel
//! pxi_daq split wide.json --card-width 32
//! pxi_daq load pulse.json gate.json --dry-run
//! pxi_daq config
//! ```
//!
//! A waveform file holds `{"name": ..., "width": ..., "states": [[...]], "transitions": [...]}`.
//! Its `width` must equal the configured `waveform.channel_width`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pxi_daq::codec::{compress, decompress_packed, decompress_with, DataLayout};
use pxi_daq::config::{PxiConfig, WaveformConfig, DEFAULT_CONFIG_PATH};
use pxi_daq::loader::WaveformLoader;
use pxi_daq::session::{InstrumentSession, MockSession, SerialSession};
use pxi_daq::{logging, Waveform};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the flat run record of a waveform
    Compress { file: PathBuf },

    /// Print the per-sample channel values of a waveform
    Decompress {
        file: PathBuf,

        /// Sample ordering (defaults to the configured layout)
        #[arg(long)]
        layout: Option<LayoutArg>,

        /// One packed 32-bit word per sample instead of per-channel values
        #[arg(long)]
        packed: bool,
    },

    /// Split a waveform across HSDIO cards
    Split {
        file: PathBuf,

        /// Channels per card (defaults to the configured card width)
        #[arg(long)]
        card_width: Option<usize>,
    },

    /// Load waveforms onto the configured device
    Load {
        files: Vec<PathBuf>,

        /// Use an in-memory session that acknowledges every load
        #[arg(long)]
        dry_run: bool,

        /// Override the configured resource
        #[arg(long)]
        resource: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    GroupBySample,
    GroupByChannel,
}

impl From<LayoutArg> for DataLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::GroupBySample => DataLayout::GroupBySample,
            LayoutArg::GroupByChannel => DataLayout::GroupByChannel,
        }
    }
}

fn read_waveform(path: &Path, config: &WaveformConfig) -> Result<Waveform> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read waveform file {}", path.display()))?;
    let waveform: Waveform = serde_json::from_str(&text)
        .with_context(|| format!("Invalid waveform JSON in {}", path.display()))?;
    waveform.validate()?;
    config
        .check_width(&waveform)
        .with_context(|| format!("Unexpected width in {}", path.display()))?;
    Ok(waveform)
}

async fn load_files<S: InstrumentSession>(
    session: S,
    config: &PxiConfig,
    resource: &str,
    files: &[PathBuf],
) -> Result<()> {
    let waveforms = files
        .iter()
        .map(|path| read_waveform(path, &config.waveform))
        .collect::<Result<Vec<_>>>()?;

    let mut loader = WaveformLoader::from_config(session, &config.session);
    loader.connect(resource).await?;
    let result = loader.load_all(&waveforms).await;
    loader.disconnect().await?;

    let loaded = result?;
    info!(loaded, resource, "Waveforms loaded");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = PxiConfig::load_from(&args.config)?;
    logging::init_from_config(&config.application)?;

    match args.command {
        Command::Compress { file } => {
            let record = compress(&read_waveform(&file, &config.waveform)?)?;
            println!("{}", serde_json::to_string(record.as_slice())?);
        }
        Command::Decompress {
            file,
            layout,
            packed,
        } => {
            let waveform = read_waveform(&file, &config.waveform)?;
            if packed {
                println!("{}", serde_json::to_string(&decompress_packed(&waveform)?)?);
            } else {
                let layout = layout.map_or(config.waveform.layout, DataLayout::from);
                let decoded = decompress_with(&waveform, layout)?;
                match layout {
                    DataLayout::GroupBySample => {
                        println!("{}", serde_json::to_string(&decoded.rows()?)?)
                    }
                    DataLayout::GroupByChannel => {
                        println!("{}", serde_json::to_string(decoded.as_flat())?)
                    }
                }
            }
        }
        Command::Split { file, card_width } => {
            let card_width = card_width.unwrap_or(config.waveform.card_width);
            let parts = read_waveform(&file, &config.waveform)?.split_channels(card_width)?;
            println!("{}", serde_json::to_string_pretty(&parts)?);
        }
        Command::Load {
            files,
            dry_run,
            resource,
        } => {
            let resource = resource.unwrap_or_else(|| config.session.resource.clone());
            if dry_run {
                let session = MockSession::new();
                for _ in &files {
                    session.push_response(b"OK\r".to_vec());
                }
                load_files(session, &config, &resource, &files).await?;
            } else {
                let session = SerialSession::from_config(&config.session);
                load_files(session, &config, &resource, &files).await?;
            }
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
