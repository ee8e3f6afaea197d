//! Continuous, fixed-gap scheduling.

use crate::job::Job;
use crate::runner::JobRunner;
use crate::token::StopAck;
use cadence_log::{debug, error, info, trace};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// State owned by one `run_continuous` call.
#[derive(Debug, Clone)]
struct ScheduleState {
    stopped: CancellationToken,
    forced: CancellationToken,
    finished: CancellationToken,
}

/// Controls a job started with [`JobRunner::run_continuous`].
///
/// Clones control the same schedule.
pub struct ScheduleHandle<T> {
    job: Job<T>,
    interval: Duration,
    state: ScheduleState,
}

impl<T> Clone for ScheduleHandle<T> {
    fn clone(&self) -> Self {
        Self {
            job: self.job.clone(),
            interval: self.interval,
            state: self.state.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ScheduleHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("job", &self.job.name())
            .field("interval", &self.interval)
            .field("stopped", &self.is_stopped())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T> ScheduleHandle<T> {
    /// Name of the scheduled job.
    pub fn job_name(&self) -> &str {
        self.job.name()
    }

    /// Gap between the end of one run and the start of the next.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop scheduling further runs.
    ///
    /// A run already in flight completes normally.
    pub fn stop(&self) {
        debug!("Stopping job {} Force? false", self.job.name());
        self.state.stopped.cancel();
    }

    /// Stop scheduling and force-stop the run in flight.
    ///
    /// The returned acknowledgment resolves with the value the running job
    /// acknowledged the stop with. With no run in flight it resolves to
    /// `None` immediately.
    pub fn force_stop(&self) -> StopAck {
        debug!("Stopping job {} Force? true", self.job.name());
        self.state.stopped.cancel();
        // A run installed after this point sees `forced` and never starts.
        self.state.forced.cancel();
        match self.job.stop() {
            Ok(ack) => ack,
            Err(e) => {
                debug!("Nothing to force-stop for job {}: {}", self.job.name(), e);
                StopAck::idle()
            }
        }
    }

    /// Whether `stop` or `force_stop` was called.
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.is_cancelled()
    }

    /// Whether the schedule has ended and will start no more runs.
    pub fn is_finished(&self) -> bool {
        self.state.finished.is_cancelled()
    }

    /// Wait until the schedule has ended.
    pub async fn finished(&self) {
        self.state.finished.cancelled().await;
    }
}

impl JobRunner {
    /// Run `job` now and again `interval` after each run settles, until stopped.
    ///
    /// Failed runs are logged and do not end the schedule. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use cadence_jobs::{Job, JobRunner};
    /// use std::time::Duration;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let runner = JobRunner::new();
    /// let job = Job::new("heartbeat", |ctx| async move {
    ///     ctx.logger().info("tick");
    ///     ctx.complete(());
    ///     Ok(())
    /// });
    ///
    /// let schedule = runner.run_continuous(&job, Duration::from_millis(10));
    /// schedule.stop();
    /// schedule.finished().await;
    /// # }
    /// ```
    pub fn run_continuous<T: Send + 'static>(
        &self,
        job: &Job<T>,
        interval: Duration,
    ) -> ScheduleHandle<T> {
        let state = ScheduleState {
            stopped: CancellationToken::new(),
            forced: CancellationToken::new(),
            finished: CancellationToken::new(),
        };

        info!(
            "Scheduling job {} every {:?} after completion",
            job.name(),
            interval
        );
        tokio::spawn(drive(self.clone(), job.clone(), interval, state.clone()));

        ScheduleHandle {
            job: job.clone(),
            interval,
            state,
        }
    }
}

async fn drive<T: Send + 'static>(
    runner: JobRunner,
    job: Job<T>,
    interval: Duration,
    state: ScheduleState,
) {
    let name = job.name().to_string();

    loop {
        if state.stopped.is_cancelled() {
            info!("Not running {} - job was stopped", name);
            break;
        }

        match runner.run_once_unless(&job, Some(&state.forced)).await {
            Ok(_) => trace!("Job {} finished successfully", name),
            Err(e) => error!("Job {} finished with error: {}", name, e),
        }

        if state.stopped.is_cancelled() {
            debug!("Job {} was stopped, not rescheduling", name);
            break;
        }

        trace!("Scheduling job {} to run in {:?}", name, interval);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = state.stopped.cancelled() => {}
        }
    }

    state.finished.cancel();
}
