//! Non-network operations behind the `file://`, `bash://` and `sql://`
//! pseudo-schemes. Each one synthesizes an HTTP-like [`Response`] so that
//! tests and checks treat them like any other request.
//!
//! [`Response`]: crate::http::Response

pub mod bash;
pub mod file;
pub mod sql;
