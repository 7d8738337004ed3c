//! The HTTP surface of PorterFS.
//!
//! Request lifecycle: the hyper [`service::PorterService`] intercepts the
//! health route, verifies the request signature from its parts (the body is
//! untouched), resolves the S3 operation through the [`router`] decision
//! table, and hands off to [`handlers`], which drive the storage engine and
//! build responses. Object bodies stream in both directions; only small XML
//! payloads are buffered.
//!
//! This crate is also the sole translator of domain errors — storage,
//! signature, and codec errors all become wire status codes and S3 `Error`
//! documents here.

pub mod body;
pub mod handlers;
pub mod response;
pub mod router;
pub mod service;

pub use body::ResponseBody;
pub use router::{resolve, RoutingContext};
pub use service::{AppState, PorterService};
