mod cmd;
mod exit;
mod hex;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "serlink", version, about = "Serial framing toolkit")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", env = "SERLINK_FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "SERLINK_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "SERLINK_LOG_LEVEL",
        default_value = "warn",
        global = true
    )]
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
    use super::*;

    #[test]
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from(["serlink", "encode", "--hex", "01 02 f7"])
            .expect("encode args should parse");
        assert!(matches!(cli.command, Command::Encode(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from(["serlink", "encode", "--hex", "01", "--data", "hello"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_zero_chunk() {
        let err = Cli::try_parse_from(["serlink", "decode", "--chunk", "0"])
            .expect_err("zero chunk should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_loopback_with_global_flags() {
        let cli = Cli::try_parse_from([
            "serlink",
            "loopback",
            "--count",
            "4",
            "--corrupt-every",
            "9",
            "--format",
            "json",
        ])
        .expect("loopback args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Command::Loopback(args) => {
                assert_eq!(args.count, 4);
                assert_eq!(args.corrupt_every, 9);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
