use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hackwire_frame::FrameError;
use hackwire_peer::{PeerError, PeerListener};
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = PeerListener::bind(&args.addr).map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %args.addr, "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut peer = listener
            .accept()
            .map_err(|err| peer_error("accept failed", err))?;
        let catalog = Arc::clone(peer.catalog());

        while running.load(Ordering::SeqCst) {
            let message = match peer.recv_message() {
                Ok(message) => message,
                Err(PeerError::Disconnected(_)) => break,
                Err(PeerError::Frame(FrameError::ConnectionClosed)) => {
                    warn!(peer = peer.id(), "peer closed mid-frame; partial frame dropped");
                    break;
                }
                Err(err) if err.is_decode_error() => {
                    // The stream cannot be resynchronized; drop this peer only.
                    warn!(peer = peer.id(), error = %err, "dropping peer after decode error");
                    break;
                }
                Err(err) => return Err(peer_error("receive failed", err)),
            };

            print_message(&message, &catalog, peer.id(), format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
        peer.destroy();
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
