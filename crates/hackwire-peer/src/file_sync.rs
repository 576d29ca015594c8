//! Typed surface for the file-sync catalog.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use hackwire_frame::{file_sync, Catalog, FieldValue, FrameConfig, FrameError, Message};
use serde::Serialize;

use crate::duplex::{ChannelEvent, ChannelState, DuplexChannel};
use crate::error::PeerError;

/// A decoded file-sync message.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSyncEvent {
    /// The peer wants the whole project.
    RequestProject,
    /// Full content of one file.
    ProvideFile { path: String, content: Bytes },
    /// A file was removed.
    DeleteFile { path: String },
    /// An incremental edit; `change` is opaque to the protocol.
    ChangeFile {
        path: String,
        change: serde_json::Value,
    },
}

impl FileSyncEvent {
    pub fn opcode(&self) -> u8 {
        match self {
            FileSyncEvent::RequestProject => file_sync::REQUEST_PROJECT,
            FileSyncEvent::ProvideFile { .. } => file_sync::PROVIDE_FILE,
            FileSyncEvent::DeleteFile { .. } => file_sync::DELETE_FILE,
            FileSyncEvent::ChangeFile { .. } => file_sync::CHANGE_FILE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileSyncEvent::RequestProject => file_sync::REQUEST_PROJECT_NAME,
            FileSyncEvent::ProvideFile { .. } => file_sync::PROVIDE_FILE_NAME,
            FileSyncEvent::DeleteFile { .. } => file_sync::DELETE_FILE_NAME,
            FileSyncEvent::ChangeFile { .. } => file_sync::CHANGE_FILE_NAME,
        }
    }

    /// The file this event is about, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            FileSyncEvent::RequestProject => None,
            FileSyncEvent::ProvideFile { path, .. }
            | FileSyncEvent::DeleteFile { path }
            | FileSyncEvent::ChangeFile { path, .. } => Some(path),
        }
    }

    /// Field values in catalog layout order.
    pub fn to_fields(&self) -> Vec<FieldValue> {
        match self {
            FileSyncEvent::RequestProject => Vec::new(),
            FileSyncEvent::ProvideFile { path, content } => vec![
                FieldValue::Text(path.clone()),
                FieldValue::Bytes(content.clone()),
            ],
            FileSyncEvent::DeleteFile { path } => vec![FieldValue::Text(path.clone())],
            FileSyncEvent::ChangeFile { path, change } => vec![
                FieldValue::Text(path.clone()),
                FieldValue::Structured(change.clone()),
            ],
        }
    }
}

impl TryFrom<Message> for FileSyncEvent {
    type Error = PeerError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        let Message {
            opcode,
            name,
            fields,
        } = message;
        let unexpected = || PeerError::UnexpectedMessage {
            expected: "file-sync".to_string(),
            got: name.clone(),
        };

        let mut fields = fields.into_iter();
        let event = match (opcode, fields.next(), fields.next()) {
            (file_sync::REQUEST_PROJECT, None, None) => FileSyncEvent::RequestProject,
            (file_sync::PROVIDE_FILE, Some(FieldValue::Text(path)), Some(content)) => {
                let content = match content {
                    FieldValue::Bytes(bytes) => bytes,
                    FieldValue::Text(text) => Bytes::from(text),
                    FieldValue::Structured(_) => return Err(unexpected()),
                };
                FileSyncEvent::ProvideFile { path, content }
            }
            (file_sync::DELETE_FILE, Some(FieldValue::Text(path)), None) => {
                FileSyncEvent::DeleteFile { path }
            }
            (
                file_sync::CHANGE_FILE,
                Some(FieldValue::Text(path)),
                Some(FieldValue::Structured(change)),
            ) => FileSyncEvent::ChangeFile { path, change },
            _ => return Err(unexpected()),
        };
        Ok(event)
    }
}

/// A [`DuplexChannel`] speaking the file-sync catalog.
pub struct FileSyncChannel<W> {
    inner: DuplexChannel<W>,
}

impl<W: Write> FileSyncChannel<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, FrameConfig::default())
    }

    pub fn with_config(writer: W, config: FrameConfig) -> Self {
        Self {
            inner: DuplexChannel::with_config(writer, Arc::new(Catalog::file_sync()), config),
        }
    }

    /// Ask the peer for its whole project.
    pub fn request_project(&mut self) -> Result<(), FrameError> {
        self.inner.send_opcode(file_sync::REQUEST_PROJECT, &[])
    }

    /// Send the full content of one file.
    pub fn provide_file(&mut self, path: &str, content: impl Into<Bytes>) -> Result<(), FrameError> {
        self.inner.send_opcode(
            file_sync::PROVIDE_FILE,
            &[FieldValue::from(path), FieldValue::Bytes(content.into())],
        )
    }

    /// Announce that a file was removed.
    pub fn delete_file(&mut self, path: &str) -> Result<(), FrameError> {
        self.inner
            .send_opcode(file_sync::DELETE_FILE, &[FieldValue::from(path)])
    }

    /// Send an incremental edit. `change` is serialized with `serde_json`.
    pub fn change_file<T: Serialize + ?Sized>(&mut self, path: &str, change: &T) -> Result<(), FrameError> {
        let change = FieldValue::structured(change)?;
        self.inner
            .send_opcode(file_sync::CHANGE_FILE, &[FieldValue::from(path), change])
    }

    /// Send a prepared event.
    pub fn send_event(&mut self, event: &FileSyncEvent) -> Result<(), FrameError> {
        self.inner.send_opcode(event.opcode(), &event.to_fields())
    }

    /// Feed one inbound transport chunk.
    pub fn receive(&mut self, chunk: impl Into<Bytes>) {
        self.inner.receive(chunk);
    }

    /// Next queued event, if any.
    pub fn poll_event(&mut self) -> Option<ChannelEvent<FileSyncEvent>> {
        self.inner.poll_event().map(|event| event.try_map(to_event))
    }

    /// All queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<ChannelEvent<FileSyncEvent>> {
        self.inner
            .drain_events()
            .into_iter()
            .map(|event| event.try_map(to_event))
            .collect()
    }

    pub fn finish(&mut self) -> Result<(), FrameError> {
        self.inner.finish()
    }

    pub fn destroy(&mut self) {
        self.inner.destroy();
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state()
    }

    /// The generic channel underneath.
    pub fn inner(&self) -> &DuplexChannel<W> {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut DuplexChannel<W> {
        &mut self.inner
    }
}

// The parser already enforced the layout, so a failure here means the catalog
// and the event enum disagree.
fn to_event(message: Message) -> Result<FileSyncEvent, FrameError> {
    let name = message.name.clone();
    FileSyncEvent::try_from(message).map_err(|err| FrameError::MalformedPayload {
        field: name,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Splice {
        from: usize,
        to: usize,
        text: String,
    }

    fn pair() -> (FileSyncChannel<Vec<u8>>, FileSyncChannel<Vec<u8>>) {
        (FileSyncChannel::new(Vec::new()), FileSyncChannel::new(Vec::new()))
    }

    fn pipe(from: &mut FileSyncChannel<Vec<u8>>, to: &mut FileSyncChannel<Vec<u8>>) {
        let bytes = std::mem::take(from.inner_mut().get_mut());
        to.receive(bytes);
    }

    fn events(channel: &mut FileSyncChannel<Vec<u8>>) -> Vec<FileSyncEvent> {
        channel
            .drain_events()
            .into_iter()
            .map(|event| match event {
                ChannelEvent::Message(event) => event,
                other => panic!("unexpected {}", other.kind()),
            })
            .collect()
    }

    #[test]
    fn every_operation_round_trips() {
        let (mut a, mut b) = pair();
        a.request_project().unwrap();
        a.provide_file("src/lib.rs", "pub fn x() {}").unwrap();
        a.change_file(
            "src/lib.rs",
            &Splice {
                from: 7,
                to: 9,
                text: "fn y".into(),
            },
        )
        .unwrap();
        a.delete_file("src/old.rs").unwrap();
        pipe(&mut a, &mut b);

        assert_eq!(
            events(&mut b),
            vec![
                FileSyncEvent::RequestProject,
                FileSyncEvent::ProvideFile {
                    path: "src/lib.rs".into(),
                    content: Bytes::from_static(b"pub fn x() {}"),
                },
                FileSyncEvent::ChangeFile {
                    path: "src/lib.rs".into(),
                    change: json!({"from": 7, "to": 9, "text": "fn y"}),
                },
                FileSyncEvent::DeleteFile {
                    path: "src/old.rs".into()
                },
            ]
        );
    }

    #[test]
    fn large_file_in_small_chunks() {
        let (mut a, mut b) = pair();
        let content = "wow".repeat(100_000);
        a.provide_file("big.txt", content.clone()).unwrap();

        let wire = std::mem::take(a.inner_mut().get_mut());
        for chunk in wire.chunks(1000) {
            b.receive(chunk.to_vec());
        }

        let received = events(&mut b);
        assert_eq!(received.len(), 1);
        match &received[0] {
            FileSyncEvent::ProvideFile { path, content: got } => {
                assert_eq!(path, "big.txt");
                assert_eq!(got.len(), 300_000);
                assert_eq!(got.as_ref(), content.as_bytes());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn send_event_matches_typed_helpers() {
        let (mut a, mut b) = pair();
        let event = FileSyncEvent::ChangeFile {
            path: "ü.txt".into(),
            change: json!({"text": "ß"}),
        };
        a.send_event(&event).unwrap();
        pipe(&mut a, &mut b);

        assert_eq!(events(&mut b), vec![event]);
    }

    #[test]
    fn event_metadata() {
        let event = FileSyncEvent::DeleteFile { path: "x".into() };
        assert_eq!(event.opcode(), 2);
        assert_eq!(event.name(), "DeleteFile");
        assert_eq!(event.path(), Some("x"));
        assert_eq!(FileSyncEvent::RequestProject.path(), None);
        assert!(FileSyncEvent::RequestProject.to_fields().is_empty());
    }

    #[test]
    fn foreign_message_is_rejected() {
        let message = Message::new(0, "Edit", vec![json!({"op": 1}).into()]);
        let err = FileSyncEvent::try_from(message).unwrap_err();
        assert!(matches!(err, PeerError::UnexpectedMessage { .. }));
    }

    #[test]
    fn lifecycle_is_delegated() {
        let (mut a, _) = pair();
        a.finish().unwrap();
        assert_eq!(a.state(), ChannelState::Finishing);
        assert!(matches!(a.request_project(), Err(FrameError::ChannelClosed)));

        a.destroy();
        let kinds: Vec<_> = a.drain_events().iter().map(ChannelEvent::kind).collect();
        assert_eq!(kinds, ["finished", "closed"]);
    }
}
