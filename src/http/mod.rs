//! HTTP boundary: the admission middleware and the server wrapper.

mod middleware;
mod server;

pub use middleware::{AdmissionLayer, AdmissionMiddleware};
pub use server::HttpServer;
