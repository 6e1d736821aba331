mod client;
mod pipeline;
mod request;
mod transport;

pub(crate) use client::send_with_timeout;
pub use client::{ApiError, HttpClient};
pub use pipeline::{Recovery, RequestDecorator, ResponseHandler};
pub(crate) use request::bearer_header;
pub use request::{ApiRequest, ApiResponse, Upload};
pub use transport::{ReqwestTransport, Transport, TransportError};
