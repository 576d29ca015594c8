use std::fs::File;
use std::io::{ErrorKind, Read};
use std::sync::Arc;

use hackwire_frame::{FrameError, FrameParser, Message};
use tracing::{debug, info};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be greater than zero"));
    }

    let catalog = Arc::new(args.catalog.catalog());
    let mut parser = FrameParser::with_config(Arc::clone(&catalog), &args.frame_config());
    let mut file = File::open(&args.file)
        .map_err(|err| io_error(&format!("failed opening {}", args.file.display()), err))?;
    let source = args.file.display().to_string();

    let decoded = decode_stream(&mut file, &mut parser, args.chunk_size, |message| {
        print_message(&message, &catalog, &source, format);
    })
    .map_err(|err| match err {
        FrameError::ConnectionClosed => {
            CliError::new(DATA_INVALID, "decode failed: capture ends inside a frame")
        }
        other => frame_error("decode failed", other),
    })?;

    info!(messages = decoded, file = %source, "decode complete");
    Ok(SUCCESS)
}

/// Feed `input` through `parser` in `chunk_size` pieces. Returns the number
/// of messages decoded; a stream that ends inside a frame is an error.
fn decode_stream<R, F>(
    input: &mut R,
    parser: &mut FrameParser,
    chunk_size: usize,
    mut on_message: F,
) -> Result<usize, FrameError>
where
    R: Read,
    F: FnMut(Message),
{
    let mut chunk = vec![0u8; chunk_size];
    let mut decoded = 0usize;
    loop {
        let read = match input.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        };
        if read == 0 {
            break;
        }
        parser.feed(chunk[..read].to_vec(), |message| {
            decoded += 1;
            on_message(message);
        })?;
    }

    if parser.is_mid_frame() {
        debug!(
            state = parser.state_name(),
            buffered = parser.buffered(),
            "capture ends inside a frame"
        );
        return Err(FrameError::ConnectionClosed);
    }
    Ok(decoded)
}
