use std::fs::OpenOptions;
use std::sync::Arc;

use hackwire_frame::{Catalog, FrameConfig, FrameWriter};
use tracing::info;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let event = args.message.to_event()?;

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(args.append)
        .truncate(!args.append)
        .open(&args.out)
        .map_err(|err| io_error(&format!("failed opening {}", args.out.display()), err))?;

    let config = FrameConfig {
        handshake: if args.no_handshake {
            None
        } else {
            FrameConfig::default().handshake
        },
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config(file, Arc::new(Catalog::file_sync()), config);
    writer
        .send(event.name(), &event.to_fields())
        .map_err(|err| frame_error("encode failed", err))?;
    writer
        .flush()
        .map_err(|err| frame_error("encode failed", err))?;

    info!(message = event.name(), out = %args.out.display(), "frame written");
    Ok(SUCCESS)
}
