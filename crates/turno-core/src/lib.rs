pub mod config;
pub mod context;
pub mod daemon;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::{RuntimeConfig, SessionConfig, WorkerConfig};
pub use context::AppContext;
pub use daemon::{Daemon, DaemonHandle, DaemonState};
pub use error::{DaemonError, JobError, RequestFault, ValveError};
pub use pipeline::{Outcome, Request, RequestHandler, Response, Valve};
pub use queue::{JobExecutor, JobQueue, Message, MessageState, PriorityKey, QueueWorker};
pub use session::{Session, SessionFactory, SessionSweeper};
pub use store::SharedMap;
