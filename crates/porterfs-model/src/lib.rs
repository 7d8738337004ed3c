//! Shared types for the PorterFS S3 surface.
//!
//! This crate is the leaf of the workspace: the operation enum produced by the
//! router, the wire-facing error type, the output records the XML codec
//! serializes, and the byte-stream alias used to move request and object
//! bodies between layers without buffering.
//!
//! # Modules
//!
//! - [`error`] - S3 error codes and the wire error type
//! - [`operations`] - The set of S3 operations PorterFS serves
//! - [`output`] - Typed records for XML response documents

pub mod error;
pub mod operations;
pub mod output;

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

pub use error::{S3Error, S3ErrorCode};
pub use operations::S3Operation;

/// A boxed stream of body chunks.
///
/// Request bodies are handed to the storage engine in this form so uploads
/// stream straight to disk; a chunk-level error means the client went away
/// and in-flight writes abort at the next I/O boundary.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;
