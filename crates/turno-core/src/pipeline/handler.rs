use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::context::AppContext;
use crate::error::{RequestFault, ValveError};
use crate::telemetry::PROFILE_TARGET;

use super::{Cookie, Request, Response, ResponseState, Valve};

/// Everything a request produced, captured once when processing ends.
/// Only the snapshot crosses the context boundary; the live request and
/// response never leave their thread.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status_code: u16,
    pub reason_phrase: String,
    pub version: String,
    pub state: ResponseState,
    pub headers: HashMap<String, Vec<String>>,
    pub cookies: Vec<Cookie>,
    pub body: Vec<u8>,
    pub fault: Option<RequestFault>,
}

impl Outcome {
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Replay the captured fields onto `target`, then surface the captured
    /// fault, if any. The fault is raised here and nowhere else, so the
    /// caller sees at most one error per request.
    pub fn copy_to_response(&self, target: &mut Response) -> Result<(), RequestFault> {
        target.set_status(self.status_code, self.reason_phrase.clone());
        target.set_version(&self.version);
        target.set_state(self.state);
        for (name, values) in &self.headers {
            for value in values {
                target.add_header(name.clone(), value.clone());
            }
        }
        for cookie in &self.cookies {
            target.add_cookie(cookie.clone());
        }
        target.append_body(&self.body);

        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn fatal_fallback(message: &str) -> Self {
        Self {
            status_code: 500,
            reason_phrase: "Internal Server Error".to_string(),
            version: "HTTP/1.1".to_string(),
            state: ResponseState::New,
            headers: HashMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
            fault: Some(RequestFault::fatal(message)),
        }
    }
}

/// Runs one request through the valve chain in its own named thread.
///
/// Configuration happens before the context starts: the handler takes the
/// request and the chain up front, and the caller gets the result only
/// after the context terminates, through [`HandlerHandle::wait`].
pub struct RequestHandler {
    ctx: Arc<AppContext>,
    valves: Vec<Arc<dyn Valve>>,
    request: Request,
}

impl RequestHandler {
    pub fn new(ctx: Arc<AppContext>, valves: Vec<Arc<dyn Valve>>, request: Request) -> Self {
        Self {
            ctx,
            valves,
            request,
        }
    }

    /// Start the isolated execution context.
    pub fn spawn(self) -> io::Result<HandlerHandle> {
        let thread = thread::Builder::new()
            .name(format!("request-handler-{}", self.ctx.name()))
            .spawn(move || self.execute())?;
        Ok(HandlerHandle { thread })
    }

    fn execute(mut self) -> Outcome {
        let mut response = Response::new();
        let mut fault: Option<RequestFault> = None;

        self.request.prepare();
        if self.ctx.profiling() {
            debug!(
                target: PROFILE_TARGET,
                application = self.ctx.name(),
                method = self.request.method(),
                uri = self.request.uri(),
                "request accepted"
            );
        }

        let chain = panic::catch_unwind(AssertUnwindSafe(|| {
            run_chain(&self.valves, &mut self.request, &mut response)
        }));
        match chain {
            Ok(Ok(())) => {
                response.set_state(ResponseState::Committed);
            }
            Ok(Err(err)) => {
                error!(application = self.ctx.name(), %err, "valve chain failed");
                fault = Some(RequestFault::from(err));
            }
            Err(payload) => {
                // The fatal guard: a panic anywhere in the chain becomes a
                // plain 500 fault instead of tearing down the caller.
                let cause = panic_message(payload);
                error!(
                    application = self.ctx.name(),
                    cause = %cause,
                    "request processing panicked"
                );
                fault = Some(RequestFault::fatal(cause));
            }
        }

        // A fault surfaces the status the valve chose: an explicitly set
        // response status wins, then the fault's own status (500 unless
        // the valve picked another).
        let (status_code, reason_phrase) = match &fault {
            Some(fault) => {
                self.ctx
                    .metrics()
                    .record_request_faulted(self.ctx.name(), fault.kind.as_str());
                if response.has_explicit_status() {
                    (response.status_code(), response.reason_phrase().to_string())
                } else {
                    (fault.status_code, default_reason(fault.status_code).to_string())
                }
            }
            None => {
                self.ctx.metrics().record_request_handled(self.ctx.name());
                (response.status_code(), response.reason_phrase().to_string())
            }
        };

        Outcome {
            status_code,
            reason_phrase,
            version: response.version().to_string(),
            state: response.state(),
            headers: response.headers().clone(),
            cookies: response.cookies().to_vec(),
            body: response.body().to_vec(),
            fault,
        }
    }
}

/// Owner side of a running request context.
pub struct HandlerHandle {
    thread: JoinHandle<Outcome>,
}

impl HandlerHandle {
    /// Block until the context terminates and take its outcome. A context
    /// that died in a way even the fatal guard missed still yields a
    /// plain 500 outcome rather than a join error.
    pub fn wait(self) -> Outcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => Outcome::fatal_fallback("request handler thread died"),
        }
    }
}

fn run_chain(
    valves: &[Arc<dyn Valve>],
    request: &mut Request,
    response: &mut Response,
) -> Result<(), ValveError> {
    for valve in valves {
        valve.invoke(request, response)?;
        if request.is_dispatched() {
            debug!(
                valve = valve.name(),
                "request dispatched, skipping remaining valves"
            );
            break;
        }
    }
    Ok(())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn default_reason(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}
