//! AcroForm dictionary rewriting for signature fields.
//!
//! Implements the document-level AcroForm dictionary per ISO 32000-1:2008
//! Section 12.7.2. A signing update either creates the dictionary or
//! rewrites the existing one with the new field appended to `/Fields` and
//! `/SigFlags` raised; every other entry (`/DR`, `/DA`, `/XFA`, ...) is
//! carried over untouched.

use crate::object::{Dictionary, Object, ObjectRef};

/// `/SigFlags` bit 1: the document contains at least one signature field.
pub const SIG_FLAG_SIGNATURES_EXIST: i64 = 1;
/// `/SigFlags` bit 2: the document must only be saved incrementally.
pub const SIG_FLAG_APPEND_ONLY: i64 = 2;

/// Builder for the document-level AcroForm dictionary.
#[derive(Debug, Clone, Default)]
pub struct AcroFormBuilder {
    /// Entries inherited from the existing AcroForm, in original order
    base: Dictionary,
    /// Existing field entries (references or, rarely, direct dictionaries)
    fields: Vec<Object>,
    /// Signature flags
    sig_flags: i64,
}

impl AcroFormBuilder {
    /// Start a fresh AcroForm.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing AcroForm dictionary, keeping its entries.
    ///
    /// `fields` is the resolved `/Fields` array (it may be stored indirectly).
    pub fn from_existing(existing: &Dictionary, fields: Vec<Object>) -> Self {
        let sig_flags = existing.get("SigFlags").and_then(Object::as_integer).unwrap_or(0);
        Self {
            base: existing.clone(),
            fields,
            sig_flags,
        }
    }

    /// Add a field reference.
    pub fn add_field(&mut self, field_ref: ObjectRef) {
        self.fields.push(Object::Reference(field_ref));
    }

    /// Mark document as containing signatures.
    pub fn signatures_exist(mut self) -> Self {
        self.sig_flags |= SIG_FLAG_SIGNATURES_EXIST;
        self
    }

    /// Mark document as append-only (for signed documents).
    pub fn append_only(mut self) -> Self {
        self.sig_flags |= SIG_FLAG_APPEND_ONLY;
        self
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Build the AcroForm dictionary.
    pub fn build(&self) -> Dictionary {
        let mut dict = self.base.clone();
        dict.insert("Fields".to_string(), Object::Array(self.fields.clone()));
        if self.sig_flags != 0 {
            dict.insert("SigFlags".to_string(), Object::Integer(self.sig_flags));
        }
        dict
    }
}
