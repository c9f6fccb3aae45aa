use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use zinflate::SafetyPolicy;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "zinflate", version)]
#[command(about = "Inflate raw DEFLATE, zlib, gzip and PNG image data", long_about = None)]
struct Args {
    /// Skip bounds checks while reading input (only for trusted, well formed files)
    #[arg(long, global = true)]
    unchecked: bool,

    /// Log more to stderr: -v info, -vv debug, -vvv trace
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inflate a raw DEFLATE stream to stdout
    Inflate { file: PathBuf },
    /// Print the header and trailer of a zlib stream
    ZlibMetadata { file: PathBuf },
    /// Inflate a zlib stream to stdout
    ZlibInflate { file: PathBuf },
    /// Print the header and trailer of the first gzip member
    GzipMetadata { file: PathBuf },
    /// Inflate every member of a gzip file to stdout
    GzipInflate { file: PathBuf },
    /// Inflate the concatenated IDAT chunks of a PNG file to stdout
    PngIdat { file: PathBuf },
    /// Print canonical Huffman codes
    HuffmanCodes {
        /// Comma separated code lengths, one per symbol (0 = unused)
        #[arg(long, value_delimiter = ',', conflicts_with = "file")]
        lengths: Vec<u8>,

        /// Build the tree from the byte frequencies of this file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting the tracing subscriber")?;

    let policy = if args.unchecked {
        SafetyPolicy::Unchecked
    } else {
        SafetyPolicy::Checked
    };

    match args.command {
        Command::Inflate { file } => commands::inflate(&file, policy),
        Command::ZlibMetadata { file } => commands::zlib_metadata(&file, policy),
        Command::ZlibInflate { file } => commands::zlib_inflate(&file, policy),
        Command::GzipMetadata { file } => commands::gzip_metadata(&file, policy),
        Command::GzipInflate { file } => commands::gzip_inflate(&file, policy),
        Command::PngIdat { file } => commands::png_idat(&file, policy),
        Command::HuffmanCodes { lengths, file } => {
            commands::huffman_codes(&lengths, file.as_deref())
        }
    }
}
