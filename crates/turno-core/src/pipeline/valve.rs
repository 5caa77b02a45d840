use crate::error::ValveError;

use super::{Request, Response};

/// One stage of the request pipeline. Valves run in declaration order
/// until one dispatches the request; an error from any valve faults the
/// whole request.
pub trait Valve: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    fn invoke(&self, request: &mut Request, response: &mut Response) -> Result<(), ValveError>;
}
