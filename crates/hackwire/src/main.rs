mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "hackwire",
    version,
    about = "Multihack wire protocol tool: listen, send, serve, and decode captures"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "HACKWIRE_LOG",
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
    use crate::cmd::{CatalogName, MessageCommand};

    #[test]
    fn parses_send_with_message() {
        let cli = Cli::try_parse_from([
            "hackwire",
            "send",
            "tcp:127.0.0.1:4000",
            "--wait",
            "provide-file",
            "src/lib.rs",
            "--content",
            "fn main() {}",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert!(args.wait);
        assert!(matches!(
            args.message,
            MessageCommand::ProvideFile { ref path, .. } if path == "src/lib.rs"
        ));
    }

    #[test]
    fn wait_flag_is_accepted_after_the_message() {
        let cli = Cli::try_parse_from([
            "hackwire",
            "send",
            "/tmp/hw.sock",
            "request-project",
            "--wait",
            "--wait-timeout",
            "250ms",
        ])
        .expect("global send flags should parse after the message");
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert!(args.wait);
        assert_eq!(args.wait_timeout, "250ms");
    }

    #[test]
    fn rejects_conflicting_content_args() {
        let err = Cli::try_parse_from([
            "hackwire",
            "encode",
            "/tmp/out.bin",
            "provide-file",
            "a.txt",
            "--content",
            "x",
            "--file",
            "/etc/hostname",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_decode_options() {
        let cli = Cli::try_parse_from([
            "hackwire",
            "decode",
            "capture.bin",
            "--chunk-size",
            "1",
            "--catalog",
            "edit",
            "--no-handshake",
            "--legacy-recovery",
        ])
        .expect("decode args should parse");
        let Command::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert_eq!(args.chunk_size, 1);
        assert!(matches!(args.catalog, CatalogName::Edit));
        let config = args.frame_config();
        assert!(config.handshake.is_none());
        assert!(config.legacy_recovery);
    }

    #[test]
    fn change_file_requires_json() {
        let cli = Cli::try_parse_from([
            "hackwire",
            "encode",
            "/tmp/out.bin",
            "change-file",
            "a.txt",
            "not json",
        ])
        .expect("args parse; JSON is checked later");
        let Command::Encode(args) = cli.command else {
            panic!("expected encode");
        };
        let err = args.message.to_event().unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from(["hackwire", "serve", "unix:/tmp/hw.sock", ".", "--once"])
            .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(ref args) if args.once));
    }
}
