//! Face-descriptor comparison for biometric unlock.
//!
//! # Responsibilities
//!
//! - Compare two face embeddings by Euclidean distance against a threshold.
//! - Separate advisory live previews from the one explicit, user-confirmed
//!   capture that may authorise an unlock.
//!
//! # Module invariants
//!
//! - **No model code.** Turning a camera frame into a [`FaceDescriptor`] is
//!   the embedding model's job; this module only compares vectors.
//! - **No crypto or storage dependencies.** Matching is pure and deterministic.

pub mod capture;
pub mod matcher;

pub use capture::{Capture, ConfirmedCapture};
pub use matcher::{euclidean_distance, is_match, FaceDescriptor, FaceMatcher, DEFAULT_MATCH_THRESHOLD};
