//! HTTP core shared by all vendor clients
//!
//! - `transport.rs`: request/response values, reqwest blocking transport
//! - `session.rs`: base URL, default headers, rate-limit retry, error interpreters
//! - `pagination.rs`: offset/limit and page/page_size collection

pub mod pagination;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod mock;

pub use pagination::{collect_pages, Page, PageFailure, PageRequest};
pub use session::{
    message_at, status_text, ApiError, ResponseInterpreter, RestSession, RetryPolicy,
    StatusTextInterpreter,
};
pub use transport::{
    BlockingTransportFactory, HttpRequest, HttpResponse, HttpTransport, Method, SessionSettings,
    TransportError, TransportFactory,
};
