//! AWS Signature Version 4 request verification for PorterFS.
//!
//! Given the metadata of an incoming HTTP request and the configured
//! credential pair, this crate decides whether the request was signed with
//! the matching secret key. It is a pure function of the request parts: the
//! body is never consumed, because the payload hash enters the canonical
//! request through the `x-amz-content-sha256` header (or the literal
//! `UNSIGNED-PAYLOAD` when absent).
//!
//! Verification failures carry a precise [`AuthError`] kind for logging, but
//! callers are expected to answer every kind with the same opaque 403 so the
//! wire response does not reveal which check failed.
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction per the SigV4 specification
//! - [`credentials`] - Credential lookup trait and the static single-pair store
//! - [`error`] - Verification error kinds
//! - [`sigv4`] - Authorization parsing, key derivation, and the verification entry point

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod sigv4;

pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::AuthError;
pub use sigv4::{verify_sigv4, AuthContext, VerifyOptions};
