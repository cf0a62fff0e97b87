use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured byte stream and print its frames.
    Decode(DecodeArgs),
    /// Encode a single frame to wire bytes.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Feed the parser at most N bytes per read.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,
    /// Input buffer size; frames larger than this are rejected.
    #[arg(long, value_name = "N")]
    pub max_frame_size: Option<usize>,
    /// Expect the SASL protocol header instead of the AMQP one.
    #[arg(long)]
    pub sasl: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Channel to encode the frame on.
    #[arg(long, short = 'c')]
    pub channel: u16,
    /// Frame body as a JSON object. Omit for an empty frame.
    #[arg(long)]
    pub body: Option<String>,
    /// Payload appended after the body.
    #[arg(long, requires = "body")]
    pub payload: Option<String>,
    /// Extended header bytes, hex encoded.
    #[arg(long, value_name = "HEX")]
    pub extended_header: Option<String>,
    /// Do not write the protocol header.
    #[arg(long)]
    pub no_header: bool,
    /// Write the SASL protocol header instead of the AMQP one.
    #[arg(long, conflicts_with = "no_header")]
    pub sasl: bool,
    /// Output file. Writes stdout when omitted.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
