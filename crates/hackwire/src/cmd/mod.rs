use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use hackwire_frame::{Catalog, FrameConfig};
use hackwire_peer::FileSyncEvent;
use hackwire_transport::TransportAddr;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept a peer and print received file-sync messages.
    Listen(ListenArgs),
    /// Connect and send a single file-sync message.
    Send(SendArgs),
    /// Answer project requests with the files under a directory.
    Serve(ServeArgs),
    /// Decode a captured byte stream.
    Decode(DecodeArgs),
    /// Write the handshake token and one frame to a file.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Serve(args) => serve::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// One file-sync message given on the command line.
#[derive(Subcommand, Debug, Clone)]
pub enum MessageCommand {
    /// Ask the peer for its whole project.
    RequestProject,
    /// Send the full content of one file.
    ProvideFile {
        /// Project-relative path.
        path: String,
        /// Inline content.
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read content from a local file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Announce that a file was removed.
    DeleteFile {
        /// Project-relative path.
        path: String,
    },
    /// Send an incremental change given as JSON.
    ChangeFile {
        /// Project-relative path.
        path: String,
        /// The change, as a JSON document.
        change: String,
    },
}

impl MessageCommand {
    pub fn to_event(&self) -> CliResult<FileSyncEvent> {
        let event = match self {
            MessageCommand::RequestProject => FileSyncEvent::RequestProject,
            MessageCommand::ProvideFile {
                path,
                content,
                file,
            } => FileSyncEvent::ProvideFile {
                path: path.clone(),
                content: read_content(content.as_deref(), file.as_deref())?.into(),
            },
            MessageCommand::DeleteFile { path } => FileSyncEvent::DeleteFile { path: path.clone() },
            MessageCommand::ChangeFile { path, change } => FileSyncEvent::ChangeFile {
                path: path.clone(),
                change: serde_json::from_str(change).map_err(|err| {
                    CliError::new(USAGE, format!("change is not valid JSON: {err}"))
                })?,
            },
        };
        Ok(event)
    }
}

fn read_content(inline: Option<&str>, file: Option<&Path>) -> CliResult<Vec<u8>> {
    match (inline, file) {
        (Some(text), _) => Ok(text.as_bytes().to_vec()),
        (None, Some(path)) => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        (None, None) => Ok(Vec::new()),
    }
}

/// Which catalog a stream is decoded with.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum CatalogName {
    #[default]
    FileSync,
    Edit,
}

impl CatalogName {
    pub fn catalog(self) -> Catalog {
        match self {
            CatalogName::FileSync => Catalog::file_sync(),
            CatalogName::Edit => Catalog::edit(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (`unix:<path>`, `tcp:<host:port>`, or a bare path).
    pub addr: TransportAddr,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    pub addr: TransportAddr,
    /// Wait for one reply message and print it.
    #[arg(long, global = true)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub wait_timeout: String,
    #[command(subcommand)]
    pub message: MessageCommand,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind.
    pub addr: TransportAddr,
    /// Project directory to serve.
    pub dir: PathBuf,
    /// Exit after the first peer disconnects.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file holding the raw byte stream.
    pub file: PathBuf,
    /// Feed the parser in chunks of this many bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk_size: usize,
    /// The capture does not start with the handshake token.
    #[arg(long)]
    pub no_handshake: bool,
    /// Catalog to decode with.
    #[arg(long, value_enum, default_value_t = CatalogName::FileSync)]
    pub catalog: CatalogName,
    /// Retry malformed structured payloads once with the legacy suffix.
    #[arg(long)]
    pub legacy_recovery: bool,
}

impl DecodeArgs {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            handshake: if self.no_handshake {
                None
            } else {
                FrameConfig::default().handshake
            },
            legacy_recovery: self.legacy_recovery,
            ..FrameConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Output file.
    pub out: PathBuf,
    /// Omit the handshake token.
    #[arg(long, global = true)]
    pub no_handshake: bool,
    /// Append to the file instead of truncating it.
    #[arg(long, global = true)]
    pub append: bool,
    #[command(subcommand)]
    pub message: MessageCommand,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
