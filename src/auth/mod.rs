//! Observer admission
//!
//! Observer (UI) connections must present the gate's current token. Each
//! token admits one connection and is replaced as soon as it is used.

pub mod gate;

pub use gate::{AdmissionDenied, AdmissionGate, DEFAULT_TOKEN_LENGTH};
