//! The tokio codec over an in-memory duplex pipe.
//!
//! Run with:
//!   cargo run --example async-loopback --features async

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use hackwire::frame::{Catalog, FieldValue, Message, WireCodec};
use serde_json::json;
use tokio_util::codec::Framed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(Catalog::file_sync());
    let (left, right) = tokio::io::duplex(64);
    let mut sender = Framed::new(left, WireCodec::new(Arc::clone(&catalog)));
    let mut receiver = Framed::new(right, WireCodec::new(catalog));

    let writer = tokio::spawn(async move {
        sender
            .send(Message::new(0, "RequestProject", vec![]))
            .await?;
        sender
            .send(Message::new(
                3,
                "ChangeFile",
                vec![
                    FieldValue::from("notes.txt"),
                    FieldValue::from(json!({"text": "héllo"})),
                ],
            ))
            .await?;
        SinkExt::<Message>::close(&mut sender).await
    });

    while let Some(message) = receiver.next().await {
        let message = message?;
        println!("{} with {} field(s)", message.name, message.fields.len());
    }

    writer.await??;
    Ok(())
}
