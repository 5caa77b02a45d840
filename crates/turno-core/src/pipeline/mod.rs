//! Per-request processing in an isolated execution context: an ordered
//! valve chain, fault wrapping into plain transportable data, and an
//! atomic outcome snapshot replayed onto the caller's response.

mod handler;
mod request;
mod response;
mod valve;

pub use handler::{HandlerHandle, Outcome, RequestHandler};
pub use request::Request;
pub use response::{Cookie, Response, ResponseState};
pub use valve::Valve;
