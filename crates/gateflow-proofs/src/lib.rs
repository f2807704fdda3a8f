//! The Proof Artifact Ledger: content-addressed evidence backing gate
//! approvals.
//!
//! Every proof's identity is the SHA-256 computed over the file bytes at
//! submission time. Clients never trust the file on disk for integrity
//! without running [`ProofLedger::verify`], which recomputes and compares.
//!
//! # Main types
//!
//! - [`ProofLedger`] — Submit, verify, and query proofs.
//! - [`GateProofStatus`] — Which required proof types a gate still lacks.
//! - [`VerifyReport`] — Outcome of an integrity check.

/// SHA-256 helpers.
pub mod hashing;
/// The ledger itself.
pub mod ledger;
/// Markdown proof reports.
pub mod report;

pub use hashing::{sha256_bytes, sha256_file};
pub use ledger::{GateProofStatus, ProofLedger, ProofSubmission, VerifyReport};
pub use report::render_proof_report;
