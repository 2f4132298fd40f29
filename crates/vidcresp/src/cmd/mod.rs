use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use vidcresp_packet::DEFAULT_MAX_RESPONSE;
use vidcresp_session::{Admission, BufferKind, Codec, Domain};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod inspect;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a raw response dump and list its packets.
    Inspect(InspectArgs),
    /// Feed response dumps through one session and report what happened.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Inspect(args) => inspect::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Response dump to read.
    pub file: PathBuf,
    /// Reject dumps larger than this many bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_RESPONSE)]
    pub max_size: usize,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Response dumps, handled in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Session id the dumps are addressed to (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "1", value_parser = parse_u32)]
    pub session: u32,
    /// Session domain.
    #[arg(long, value_enum, default_value = "decode")]
    pub domain: DomainArg,
    /// Session codec.
    #[arg(long, value_enum, default_value = "h264")]
    pub codec: CodecArg,
    /// Frames per batched input buffer; values above 1 enable batching.
    #[arg(long, default_value_t = 0)]
    pub super_frame: u32,
    /// Frame size reported for batched buffers.
    #[arg(long, default_value_t = 0)]
    pub frame_size: u32,
    /// Buffer queued before the first dump, as KIND:ADDR[:INDEX].
    #[arg(long = "buffer", value_name = "KIND:ADDR", value_parser = parse_buffer)]
    pub buffers: Vec<BufferSeed>,
    /// Admission verdict for deferred work.
    #[arg(long, value_enum, default_value = "allow")]
    pub admission: AdmissionArg,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DomainArg {
    Decode,
    Encode,
}

impl From<DomainArg> for Domain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Decode => Domain::Decode,
            DomainArg::Encode => Domain::Encode,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum CodecArg {
    H264,
    Hevc,
    Vp9,
    Av1,
    Heic,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::H264 => Codec::H264,
            CodecArg::Hevc => Codec::Hevc,
            CodecArg::Vp9 => Codec::Vp9,
            CodecArg::Av1 => Codec::Av1,
            CodecArg::Heic => Codec::Heic,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum AdmissionArg {
    Allow,
    Defer,
    Disallow,
}

impl From<AdmissionArg> for Admission {
    fn from(arg: AdmissionArg) -> Self {
        match arg {
            AdmissionArg::Allow => Admission::Allow,
            AdmissionArg::Defer => Admission::Defer,
            AdmissionArg::Disallow => Admission::Disallow,
        }
    }
}

/// A buffer to queue before replaying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSeed {
    pub kind: BufferKind,
    pub address: u64,
    pub index: u32,
}

fn parse_u64(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input}"))
}

fn parse_u32(input: &str) -> Result<u32, String> {
    let value = parse_u64(input)?;
    u32::try_from(value).map_err(|_| format!("value out of range: {input}"))
}

fn parse_buffer(input: &str) -> Result<BufferSeed, String> {
    let mut parts = input.split(':');
    let kind_name = parts.next().unwrap_or_default();
    let kind =
        BufferKind::from_name(kind_name).ok_or_else(|| format!("unknown buffer kind: {kind_name}"))?;
    let address = parts
        .next()
        .ok_or_else(|| format!("missing address in {input}"))
        .and_then(parse_u64)?;
    let index = parts.next().map(parse_u32).transpose()?.unwrap_or(0);
    if parts.next().is_some() {
        return Err(format!("expected KIND:ADDR[:INDEX], got {input}"));
    }
    Ok(BufferSeed {
        kind,
        address,
        index,
    })
}
