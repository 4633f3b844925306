//! Upstream government APIs
//!
//! Both clients are generic over [`transport::HttpTransport`] and write
//! straight into the store.

pub mod eol;
pub mod sof;
pub mod transport;

pub use eol::{EolClient, EolError};
pub use sof::{SofClient, SofError, SyncSummary, TRANSPORT_ERROR_CODE};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
