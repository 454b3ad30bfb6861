//! Multi-party signature delegation.
//!
//! A delegator grants a delegate the right to sign a document. The
//! delegate's signature can require the delegator's approval first, and
//! every signing or approving step is gated by a TOTP second factor.
//! [`DelegationWorkflow`] enforces the state machine and runs the signing
//! pipeline as the final side effect.
//!
//! # Example
//!
//! ```no_run
//! use pdf_seal::config::WorkflowConfig;
//! use pdf_seal::delegation::{CreateDelegation, DelegationWorkflow, WorkflowPorts};
//!
//! # fn run(ports: WorkflowPorts) -> pdf_seal::Result<()> {
//! let workflow = DelegationWorkflow::new(WorkflowConfig::default(), ports);
//! let delegation = workflow.create(
//!     CreateDelegation::new("alice", "bob", "Contract approval").with_document("contract-17"),
//! )?;
//! let signed = workflow.sign(delegation.id, "bob", "123456")?;
//! println!("{}", signed.status);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod clock;
pub mod locks;
pub mod model;
pub mod ports;
pub mod store;
pub mod totp;
pub mod workflow;

pub use audit::{AuditAction, AuditEvent, LogAuditSink, MemoryAuditSink};
pub use clock::{ManualClock, SystemClock};
pub use locks::LockRegistry;
pub use model::{ArtifactRef, CreateDelegation, Delegation, DelegationStatus, SignatureDraft, DRAFT_METADATA_KEY};
pub use ports::{ArtifactStore, AuditSink, Clock, DelegationRepository, TotpVerifier};
pub use store::{FsArtifactStore, MemoryArtifactStore, MemoryDelegationRepository};
pub use totp::TotpAuthenticator;
pub use workflow::{call_with_timeout, DelegationWorkflow, WorkflowPorts};
