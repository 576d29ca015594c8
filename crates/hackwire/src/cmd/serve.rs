use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hackwire_peer::{FileSyncEvent, Peer, PeerError, PeerListener};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cmd::ServeArgs;
use crate::exit::{io_error, peer_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    if !args.dir.is_dir() {
        return Err(CliError::new(
            USAGE,
            format!("{} is not a directory", args.dir.display()),
        ));
    }

    let listener = PeerListener::bind(&args.addr).map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %args.addr, dir = %args.dir.display(), "serving project");

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    while running.load(Ordering::SeqCst) {
        let mut peer = listener
            .accept()
            .map_err(|err| peer_error("accept failed", err))?;
        info!(peer = peer.id(), transport = peer.transport_name(), "peer connected");

        if let Err(err) = serve_peer(&mut peer, &args.dir) {
            warn!(peer = peer.id(), error = %err, "peer session ended with error");
        }
        peer.destroy();

        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

fn serve_peer(peer: &mut Peer, dir: &Path) -> CliResult<()> {
    loop {
        let event = match peer.recv_file_sync() {
            Ok(event) => event,
            Err(PeerError::Disconnected(_)) => {
                info!(peer = peer.id(), "peer disconnected");
                return Ok(());
            }
            Err(err) => return Err(peer_error("receive failed", err)),
        };

        match event {
            FileSyncEvent::RequestProject => {
                let files = project_files(dir)?;
                info!(peer = peer.id(), files = files.len(), "sending project");
                for (path, local) in files {
                    let content = std::fs::read(&local).map_err(|err| {
                        io_error(&format!("failed reading {}", local.display()), err)
                    })?;
                    debug!(path = %path, size = content.len(), "provide file");
                    peer.send_file_sync(&FileSyncEvent::ProvideFile {
                        path,
                        content: content.into(),
                    })
                    .map_err(|err| peer_error("send failed", err))?;
                }
            }
            other => {
                info!(
                    peer = peer.id(),
                    message = other.name(),
                    path = other.path().unwrap_or(""),
                    "received"
                );
            }
        }
    }
}

/// Regular files under `root` as (project path, local path), sorted by
/// project path. Project paths are relative and `/`-separated.
fn project_files(root: &Path) -> CliResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            CliError::new(INTERNAL, format!("failed walking {}: {err}", root.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((path, entry.into_path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn project_files_are_relative_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("README.md"), "# x").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();

        let paths: Vec<String> = project_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        assert_eq!(paths, ["README.md", "src/lib.rs", "src/nested/mod.rs"]);
    }

    #[test]
    fn empty_directory_has_no_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        assert!(project_files(dir.path()).unwrap().is_empty());
    }
}
