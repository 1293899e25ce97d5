//! VC-2 CLI - command-line stream encoding and decoding.

use clap::{Parser, Subcommand};

mod commands;

use commands::{CmdDecode, CmdEncode};

/// Command-line arguments for the vc2 tool.
#[derive(Parser, Debug)]
#[command(name = "vc2")]
#[command(version)]
#[command(about = "A SMPTE ST 2042 (VC-2) stream encoder and decoder")]
#[command(long_about = "Encodes raw planar image sequences into VC-2 streams and decodes \n\
    VC-2 streams back to planar files.\n\n\
    '-' as a file name means standard input or standard output.\n\n\
    EXAMPLES:\n    \
    vc2 decode stream.vc2 out.yuv\n    \
    vc2 decode -v - - < stream.vc2 > out.yuv\n    \
    vc2 decode --output indices stream.vc2 indices.raw\n    \
    vc2 encode --width 1920 --height 1080 --chroma c422 in.yuv stream.vc2")]
struct Args {
    /// Verbose output (per-unit decode narration)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a VC-2 stream to a planar file
    Decode(CmdDecode),
    /// Encode planar frames into a VC-2 stream
    Encode(CmdEncode),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Diagnostics go to stderr; stdout may carry decoded samples.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Decode(cmd) => cmd.run(),
        Command::Encode(cmd) => cmd.run(),
    }
}
