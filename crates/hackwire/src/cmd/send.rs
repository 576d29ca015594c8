use std::time::Duration;

use hackwire_frame::Message;
use hackwire_peer::{connect_with_config, Peer, PeerConfig, PeerError};

use crate::cmd::SendArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let event = args.message.to_event()?;

    let config = PeerConfig::default().with_read_timeout(Some(wait_timeout));
    let mut peer =
        connect_with_config(&args.addr, config).map_err(|err| peer_error("connect failed", err))?;

    peer.send_file_sync(&event)
        .map_err(|err| peer_error("send failed", err))?;

    if args.wait {
        let message = wait_for_reply(&mut peer).map_err(|err| peer_error("receive failed", err))?;
        let catalog = std::sync::Arc::clone(peer.catalog());
        print_message(&message, &catalog, peer.id(), format);
    }

    peer.finish().map_err(|err| peer_error("finish failed", err))?;
    Ok(SUCCESS)
}

trait ReplySource {
    fn next_message(&mut self) -> Result<Message, PeerError>;
}

impl ReplySource for Peer {
    fn next_message(&mut self) -> Result<Message, PeerError> {
        self.recv_message()
    }
}

/// First reply message. A peer that closes without answering is reported as
/// disconnected rather than as a successful empty reply.
fn wait_for_reply<R: ReplySource>(source: &mut R) -> Result<Message, PeerError> {
    match source.next_message() {
        Ok(message) => Ok(message),
        Err(PeerError::Disconnected(reason)) => Err(PeerError::Disconnected(format!(
            "peer closed before replying ({reason})"
        ))),
        Err(err) => Err(err),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
