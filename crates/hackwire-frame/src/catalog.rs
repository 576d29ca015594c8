//! Message catalogs.
//!
//! A catalog fixes, for one protocol instantiation, which opcode maps to which
//! message and which variable fields follow its header. It is built once and
//! shared read-only by every encoder and parser using it.

use std::collections::HashMap;
use std::fmt;

use crate::error::CatalogError;

/// How a variable field's payload is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Raw bytes, passed through untouched.
    Bytes,
    /// UTF-8 text.
    Text,
    /// JSON-serialized structured data, carried as text.
    Structured,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bytes => "bytes",
            FieldKind::Text => "text",
            FieldKind::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// One variable field in a message layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A catalog entry: opcode, message name and ordered field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    pub opcode: u8,
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// Fixed opcode → layout mapping for one protocol instantiation.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<MessageSpec>,
    by_opcode: HashMap<u8, usize>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Start building a custom catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The file-sync instantiation (`RequestProject`, `ProvideFile`,
    /// `DeleteFile`, `ChangeFile`).
    pub fn file_sync() -> Self {
        Self::from_entries(vec![
            MessageSpec {
                opcode: file_sync::REQUEST_PROJECT,
                name: file_sync::REQUEST_PROJECT_NAME.to_string(),
                fields: Vec::new(),
            },
            MessageSpec {
                opcode: file_sync::PROVIDE_FILE,
                name: file_sync::PROVIDE_FILE_NAME.to_string(),
                fields: vec![
                    FieldSpec::new("path", FieldKind::Text),
                    FieldSpec::new("content", FieldKind::Bytes),
                ],
            },
            MessageSpec {
                opcode: file_sync::DELETE_FILE,
                name: file_sync::DELETE_FILE_NAME.to_string(),
                fields: vec![FieldSpec::new("path", FieldKind::Text)],
            },
            MessageSpec {
                opcode: file_sync::CHANGE_FILE,
                name: file_sync::CHANGE_FILE_NAME.to_string(),
                fields: vec![
                    FieldSpec::new("path", FieldKind::Text),
                    FieldSpec::new("change", FieldKind::Structured),
                ],
            },
        ])
    }

    /// The collaborative-edit instantiation: a single `Edit` message.
    pub fn edit() -> Self {
        Self::from_entries(vec![MessageSpec {
            opcode: edit::EDIT,
            name: edit::EDIT_NAME.to_string(),
            fields: vec![FieldSpec::new("edit", FieldKind::Structured)],
        }])
    }

    // Built-in tables are known to be free of duplicates.
    fn from_entries(entries: Vec<MessageSpec>) -> Self {
        let by_opcode = entries
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.opcode, idx))
            .collect();
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.name.clone(), idx))
            .collect();
        Self {
            entries,
            by_opcode,
            by_name,
        }
    }

    pub fn by_opcode(&self, opcode: u8) -> Option<&MessageSpec> {
        self.index_of_opcode(opcode).map(|idx| &self.entries[idx])
    }

    /// Position of the entry for `opcode` within [`entries`](Catalog::entries).
    pub fn index_of_opcode(&self, opcode: u8) -> Option<usize> {
        self.by_opcode.get(&opcode).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&MessageSpec> {
        self.by_name.get(name).map(|idx| &self.entries[*idx])
    }

    /// Human-readable name for an opcode, `"UNKNOWN"` if unmapped.
    pub fn opcode_name(&self, opcode: u8) -> &str {
        self.by_opcode(opcode)
            .map(|spec| spec.name.as_str())
            .unwrap_or("UNKNOWN")
    }

    pub fn entries(&self) -> &[MessageSpec] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a [`Catalog`], rejecting duplicate opcodes, names and field names.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<MessageSpec>,
}

impl CatalogBuilder {
    /// Register a message with its ordered field layout.
    pub fn message(
        mut self,
        opcode: u8,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldSpec>,
    ) -> Self {
        self.entries.push(MessageSpec {
            opcode,
            name: name.into(),
            fields: fields.into_iter().collect(),
        });
        self
    }

    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut by_opcode = HashMap::with_capacity(self.entries.len());
        let mut by_name = HashMap::with_capacity(self.entries.len());

        for (idx, spec) in self.entries.iter().enumerate() {
            if by_opcode.insert(spec.opcode, idx).is_some() {
                return Err(CatalogError::DuplicateOpcode(spec.opcode));
            }
            if by_name.insert(spec.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateName(spec.name.clone()));
            }
            for (pos, field) in spec.fields.iter().enumerate() {
                if spec.fields[..pos].iter().any(|f| f.name == field.name) {
                    return Err(CatalogError::DuplicateField {
                        message: spec.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(Catalog {
            entries: self.entries,
            by_opcode,
            by_name,
        })
    }
}

/// Opcodes and names of the file-sync catalog.
pub mod file_sync {
    /// Ask the peer for its whole project; no fields.
    pub const REQUEST_PROJECT: u8 = 0;
    /// Full file content: `path`, `content`.
    pub const PROVIDE_FILE: u8 = 1;
    /// File removal: `path`.
    pub const DELETE_FILE: u8 = 2;
    /// Incremental edit: `path`, `change`.
    pub const CHANGE_FILE: u8 = 3;

    pub const REQUEST_PROJECT_NAME: &str = "RequestProject";
    pub const PROVIDE_FILE_NAME: &str = "ProvideFile";
    pub const DELETE_FILE_NAME: &str = "DeleteFile";
    pub const CHANGE_FILE_NAME: &str = "ChangeFile";
}

/// Opcode and name of the collaborative-edit catalog.
pub mod edit {
    pub const EDIT: u8 = 0;
    pub const EDIT_NAME: &str = "Edit";
}
