//! REST client for the document backend: PDF upload, embedding generation,
//! listing, deletion and per-document chat history.

mod client;
mod error;
mod http;
mod types;

pub use client::DocumentsClient;
pub use error::{ApiError, ApiResult};
pub use types::{ChatMessage, Document};
