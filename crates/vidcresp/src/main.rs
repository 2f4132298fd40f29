mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "vidcresp", version, about = "Video firmware response inspector")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use vidcresp_session::{BufferKind, InternalKind};

    use super::*;

    #[test]
    fn parses_replay_subcommand() {
        let cli = Cli::try_parse_from([
            "vidcresp",
            "replay",
            "a.bin",
            "b.bin",
            "--session",
            "0x10",
            "--domain",
            "encode",
            "--buffer",
            "output:0x1000",
            "--buffer",
            "arp:0x2000:1",
        ])
        .expect("replay args should parse");

        let Command::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.session, 0x10);
        assert_eq!(args.buffers[0].kind, BufferKind::Output);
        assert_eq!(args.buffers[1].kind, BufferKind::Internal(InternalKind::Arp));
    }

    #[test]
    fn replay_needs_a_file() {
        let err = Cli::try_parse_from(["vidcresp", "replay"])
            .expect_err("missing files should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_buffer_kind() {
        let err = Cli::try_parse_from(["vidcresp", "replay", "a.bin", "--buffer", "frame:0x1"])
            .expect_err("bad buffer kind should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_inspect_with_format() {
        let cli = Cli::try_parse_from(["vidcresp", "--format", "pretty", "inspect", "dump.bin"])
            .expect("inspect args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Pretty));
        assert!(matches!(cli.command, Command::Inspect(_)));
    }
}
