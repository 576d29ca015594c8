use bytes::Bytes;
use serde::Serialize;

use crate::catalog::FieldKind;
use crate::error::Result;

/// A materialized field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bytes(Bytes),
    Text(String),
    Structured(serde_json::Value),
}

impl FieldValue {
    /// Serialize any `serde` value into a structured field.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(FieldValue::Structured(serde_json::to_value(value)?))
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bytes(_) => FieldKind::Bytes,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Structured(_) => FieldKind::Structured,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes of a bytes or text field.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(bytes) => Some(bytes),
            FieldValue::Text(text) => Some(text.as_bytes()),
            FieldValue::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            FieldValue::Structured(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(Bytes::from(value))
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Structured(value)
    }
}

/// One decoded message, handed to the application and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub opcode: u8,
    pub name: String,
    /// Field values in catalog layout order.
    pub fields: Vec<FieldValue>,
}

impl Message {
    pub fn new(opcode: u8, name: impl Into<String>, fields: Vec<FieldValue>) -> Self {
        Self {
            opcode,
            name: name.into(),
            fields,
        }
    }
}
