//! Two peers on a Unix socket: one asks for the project, the other answers
//! with its files and then receives a live change.
//!
//! Run with:
//!   cargo run --example file-sync-loopback --features peer

use std::fs;
use std::thread;

use hackwire::peer::{connect, FileSyncEvent, PeerListener};
use hackwire::transport::TransportAddr;
use serde_json::json;

const PROJECT: [(&str, &str); 2] = [("README.md", "# demo\n"), ("src/main.rs", "fn main() {}\n")];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("hackwire-loopback-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let addr = TransportAddr::Unix(sock_dir.join("sync.sock"));

    let listener = PeerListener::bind(&addr)?;
    eprintln!("Listening on {addr}");

    let server = thread::spawn(move || -> Result<(), hackwire::peer::PeerError> {
        let mut peer = listener.accept()?;
        loop {
            match peer.recv_file_sync() {
                Ok(FileSyncEvent::RequestProject) => {
                    for (path, content) in PROJECT {
                        peer.send_file_sync(&FileSyncEvent::ProvideFile {
                            path: path.to_string(),
                            content: content.into(),
                        })?;
                    }
                }
                Ok(event) => eprintln!("server got {} for {:?}", event.name(), event.path()),
                Err(err) => {
                    eprintln!("server: {err}");
                    return Ok(());
                }
            }
        }
    });

    let mut client = connect(&addr)?;
    client.send_file_sync(&FileSyncEvent::RequestProject)?;
    for _ in 0..PROJECT.len() {
        if let FileSyncEvent::ProvideFile { path, content } = client.recv_file_sync()? {
            eprintln!("client got {path} ({} bytes)", content.len());
        }
    }

    client.send_file_sync(&FileSyncEvent::ChangeFile {
        path: "src/main.rs".into(),
        change: json!({
            "from": {"line": 0, "ch": 11},
            "to": {"line": 0, "ch": 11},
            "text": ["println!()"]
        }),
    })?;
    client.finish()?;

    if let Ok(result) = server.join() {
        result?;
    }
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
