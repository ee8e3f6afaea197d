//! Named async jobs for cadence.
//!
//! Provides:
//! - 📛 Named jobs wrapping async work behind one completion contract
//! - 🔒 At most one in-flight run per job name
//! - 🔁 Fixed-gap continuous scheduling
//! - 🛑 Soft stop and cooperative force stop
//!
//! ## Run Once
//!
//! ```
//! use cadence_jobs::*;
//!
//! # #[tokio::main]
//! # async fn main() -> JobResult<()> {
//! let runner = JobRunner::new();
//! let job = Job::new("cleanup", |ctx| async move {
//!     ctx.logger().info("removing stale files");
//!     ctx.complete(3);
//!     Ok(())
//! });
//!
//! let removed = runner.run_once(&job).await?;
//! assert_eq!(removed, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Run Continuously, Force Stop
//!
//! ```no_run
//! use cadence_jobs::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let runner = JobRunner::new();
//! let job = Job::new("sync", |ctx: JobContext<()>| async move {
//!     if let Some(listener) = ctx.stop_listener() {
//!         if let Some(request) = listener.wait().await {
//!             request.acknowledge("flushed");
//!         }
//!     }
//!     Ok(())
//! });
//!
//! let schedule = runner.run_continuous(&job, Duration::from_secs(30));
//! // later
//! let ack = schedule.force_stop().await;
//! println!("stopped: {:?}", ack);
//! # }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod runner;
pub mod scheduler;
pub mod token;

pub use config::{IdleStop, JobConfig};
pub use error::{BoxError, JobError, JobResult};
pub use job::{Completer, Job, JobContext, JobFn};
pub use runner::{JobRunner, RunClaim, RunningSet};
pub use scheduler::ScheduleHandle;
pub use token::{StopAck, StopListener, StopRequest};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{IdleStop, JobConfig};
    pub use crate::error::{BoxError, JobError, JobResult};
    pub use crate::job::{Job, JobContext};
    pub use crate::runner::JobRunner;
    pub use crate::scheduler::ScheduleHandle;
    pub use crate::token::{StopAck, StopRequest};
}
