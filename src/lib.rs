// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::new_without_default)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Seal
//!
//! Incremental PDF signing and multi-party signature delegation.
//!
//! ## Signing pipeline
//!
//! - **Placeholder insertion**: appends an incremental update with a
//!   signature dictionary whose `/ByteRange` and `/Contents` are
//!   fixed-width templates, a signature widget, and the rewritten page,
//!   AcroForm and catalog. The original bytes are never touched.
//! - **Metadata patching**: writes `/Name`, `/Reason`, `/Location`,
//!   `/ContactInfo` and `/M` into a reserved whitespace slot.
//! - **ByteRange finalization**: writes the real offsets in place.
//! - **Digest calculation**: SHA-1/256/384/512 over everything but the
//!   contents region.
//! - **Embedding**: the external signature goes into the reserved region
//!   as zero-padded hex; the file length never changes.
//! - **Inspection**: finds signed fields in a file and checks their
//!   ByteRange structurally (ISO 32000-1:2008 §12.8).
//!
//! ## Delegation workflow
//!
//! [`delegation::DelegationWorkflow`] coordinates a delegator, a delegate,
//! optional approval and a TOTP second factor before running the pipeline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_seal::config::SigningConfig;
//! use pdf_seal::signatures::{PdfSigner, SignerMetadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let original = std::fs::read("contract.pdf")?;
//! let signer = PdfSigner::new(SigningConfig::default());
//!
//! // Two-step form: hand the digest to an HSM, embed what it returns
//! let prepared = signer.prepare(&original, &SignerMetadata::new().with_reason("Approval"))?;
//! let cms_blob = vec![0u8; 32]; // from the HSM
//! let signed = signer.finish(prepared, &cms_blob)?;
//! std::fs::write("contract-signed.pdf", &signed.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// PDF writing (incremental updates)
pub mod writer;

// Digital signatures
pub mod signatures;

// Delegation workflow
pub mod delegation;

// Re-exports
pub use config::{SigningConfig, WorkflowConfig};
pub use document::PdfDocument;
pub use error::{Error, ErrorCategory, Result};
pub use signatures::{PdfSigner, SignedArtifact, SignerMetadata};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
