//! Backend Gateway and its HTTP transport

mod endpoint;
pub mod error;
mod gateway;
pub mod transport;

pub use endpoint::{Endpoint, Method};
pub use error::ApiError;
pub use gateway::{Gateway, StageResult};
pub use transport::{
    BackendRequest, BackendResponse, HttpTransport, MockTransport, RequestBody, Transport,
    TransportFailure,
};
