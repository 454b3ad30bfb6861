//! PDF writing for incremental updates.
//!
//! ## Architecture
//!
//! ```text
//! PdfDocument (original bytes, parsed xref chain)
//!     ↓
//! [IncrementalUpdate] (new / replaced objects, xref section, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! original bytes ++ update bytes
//! ```
//!
//! ```no_run
//! use pdf_seal::document::PdfDocument;
//! use pdf_seal::object::Object;
//! use pdf_seal::writer::IncrementalUpdate;
//!
//! let bytes = std::fs::read("in.pdf")?;
//! let doc = PdfDocument::parse(&bytes)?;
//! let mut update = IncrementalUpdate::new(&doc);
//! let mut catalog = doc.catalog()?;
//! catalog.insert("Lang".into(), Object::String(b"en-US".to_vec()));
//! update.put(doc.catalog_ref()?, &Object::Dictionary(catalog));
//! let output = update.write()?;
//! std::fs::write("out.pdf", output.bytes)?;
//! # Ok::<(), pdf_seal::error::Error>(())
//! ```

mod acroform;
mod incremental;
mod object_serializer;

pub use acroform::{AcroFormBuilder, SIG_FLAG_APPEND_ONLY, SIG_FLAG_SIGNATURES_EXIST};
pub use incremental::{IncrementalUpdate, UpdateOutput};
pub use object_serializer::{indirect_header, wrap_indirect, ObjectSerializer};
