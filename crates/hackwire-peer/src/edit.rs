//! Typed surface for the collaborative-edit catalog.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use hackwire_frame::{edit, Catalog, FieldValue, FrameConfig, FrameError, Message};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::duplex::{ChannelEvent, ChannelState, DuplexChannel};

/// A decoded collaborative-edit message.
#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    /// One edit operation, opaque to the protocol.
    Edit(serde_json::Value),
}

impl EditEvent {
    /// Deserialize the edit into the caller's operation type.
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match self {
            EditEvent::Edit(value) => T::deserialize(value),
        }
    }
}

/// A [`DuplexChannel`] speaking the single-message edit catalog.
pub struct EditChannel<W> {
    inner: DuplexChannel<W>,
}

impl<W: Write> EditChannel<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, FrameConfig::default())
    }

    pub fn with_config(writer: W, config: FrameConfig) -> Self {
        Self {
            inner: DuplexChannel::with_config(writer, Arc::new(Catalog::edit()), config),
        }
    }

    /// Send one edit operation, serialized with `serde_json`.
    pub fn edit<T: Serialize + ?Sized>(&mut self, operation: &T) -> Result<(), FrameError> {
        let operation = FieldValue::structured(operation)?;
        self.inner.send_opcode(edit::EDIT, &[operation])
    }

    pub fn receive(&mut self, chunk: impl Into<Bytes>) {
        self.inner.receive(chunk);
    }

    pub fn poll_event(&mut self) -> Option<ChannelEvent<EditEvent>> {
        self.inner.poll_event().map(|event| event.try_map(to_event))
    }

    pub fn drain_events(&mut self) -> Vec<ChannelEvent<EditEvent>> {
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

    pub fn inner_mut(&mut self) -> &mut DuplexChannel<W> {
        &mut self.inner
    }
}

fn to_event(message: Message) -> Result<EditEvent, FrameError> {
    match message.fields.into_iter().next() {
        Some(FieldValue::Structured(value)) => Ok(EditEvent::Edit(value)),
        _ => Err(FrameError::MalformedPayload {
            field: "edit".to_string(),
            reason: format!("'{}' carries no structured edit", message.name),
        }),
    }
}
