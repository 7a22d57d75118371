//! Command-line reader for German electronic health cards

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use egk_apdu_core::ChannelConfig;
use egk_apdu_transport_pcsc::{PcscChannelFactory, PcscConfig};
use egk_card::SessionConfig;

mod commands;

use commands::*;

#[derive(Debug, Parser)]
#[command(version, about = "Read the insured person's data from a German health card")]
struct Cli {
    /// Only use readers whose name contains this string
    #[arg(short, long)]
    reader: Option<String>,

    /// Seconds to wait for a card (waits forever if not specified)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Logical channel used for the card session (0-3)
    #[arg(short, long, default_value_t = 0)]
    channel: u8,

    /// Never send extended length APDUs
    #[arg(long)]
    short_apdus: bool,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Show whether the PC/SC service and a matching reader are usable
    Status,

    /// Read EF.PD and EF.VD from a card
    Read {
        /// Card access number printed on the card (6 digits)
        #[arg(long, required = true)]
        can: String,

        /// Directory the files are written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write the decompressed XML documents instead of the raw files
        #[arg(short, long)]
        decompress: bool,

        /// Skip the protected insurance data
        #[arg(long)]
        skip_protected: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut pcsc_config = PcscConfig::new();
    if let Some(reader) = &cli.reader {
        pcsc_config = pcsc_config.with_reader_filter(reader.as_str());
    }
    let factory = PcscChannelFactory::with_config(pcsc_config);

    match cli.command {
        Commands::List => list_readers(&factory)?,
        Commands::Status => status_command(&factory),
        Commands::Read {
            can,
            output,
            decompress,
            skip_protected,
        } => {
            let mut channel = ChannelConfig::new().with_logical_channel(cli.channel);
            if cli.short_apdus {
                channel = channel.short_only();
            }
            let mut config = SessionConfig::new()
                .with_channel(channel)
                .with_read_secondary(!skip_protected);
            if let Some(secs) = cli.timeout {
                config = config.with_discovery_timeout(Duration::from_secs(secs));
            }
            read_command(factory, config, &can, &output, decompress)?
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
