//! Request description, compilation and transport.

pub mod client;
pub mod compile;
pub mod method;
pub mod multipart;
pub mod request;
pub mod response;

pub use compile::{CompiledRequest, RequestCompiler, Scheme};
pub use method::HttpMethod;
pub use request::{BasicAuth, Cookie, ParamsAs, Request};
pub use response::Response;
