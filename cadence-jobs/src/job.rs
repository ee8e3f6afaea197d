//! Job definition and invocation.

use crate::config::{IdleStop, JobConfig};
use crate::error::{BoxError, JobError, JobResult};
use crate::token::{StopAck, StopListener, StopToken};
use cadence_log::{debug, Logger};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Name given to jobs created with an empty name.
pub const UNNAMED_JOB: &str = "<unnamed job>";

/// Job work function type.
pub type JobFn<T> = Arc<
    dyn Fn(JobContext<T>) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>
        + Send
        + Sync,
>;

type Slot<T> = Mutex<Option<oneshot::Sender<JobResult<T>>>>;

/// Settles a run. The first outcome wins; later ones are ignored.
///
/// Once every completer of a run is dropped without settling it, the run
/// can no longer succeed and fails with [`JobError::Abandoned`].
pub struct Completer<T> {
    slot: Arc<Slot<T>>,
    logger: Logger,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<T> Completer<T> {
    fn new(tx: oneshot::Sender<JobResult<T>>, logger: Logger) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tx))),
            logger,
        }
    }

    /// Settle the run with `value`. Returns `false` if it was already settled.
    pub fn complete(&self, value: T) -> bool {
        settle_slot(&self.slot, &self.logger, Ok(value))
    }

    /// Fail the run with `error`. Returns `false` if it was already settled.
    pub fn fail(&self, error: impl Into<BoxError>) -> bool {
        settle_slot(&self.slot, &self.logger, Err(JobError::Failed(error.into())))
    }

    /// Whether the run already has an outcome.
    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }

    fn downgrade(&self) -> Settler<T> {
        Settler {
            slot: Arc::downgrade(&self.slot),
            logger: self.logger.clone(),
        }
    }
}

/// The run's own handle on the settle slot. It does not keep the run
/// settleable on its own.
struct Settler<T> {
    slot: Weak<Slot<T>>,
    logger: Logger,
}

impl<T> Settler<T> {
    /// Settle through the slot if any completer is still alive. Hands the
    /// outcome back when none is.
    fn settle(&self, outcome: JobResult<T>) -> Option<JobResult<T>> {
        match self.slot.upgrade() {
            Some(slot) => {
                settle_slot(&slot, &self.logger, outcome);
                None
            }
            None => Some(outcome),
        }
    }
}

fn settle_slot<T>(slot: &Slot<T>, logger: &Logger, outcome: JobResult<T>) -> bool {
    let Some(tx) = slot.lock().take() else {
        logger.trace("Ignoring outcome reported after the run was already settled");
        return false;
    };
    // The receiver only goes away once the run future is dropped.
    let _ = tx.send(outcome);
    true
}

/// Job execution context handed to the work function on every run.
pub struct JobContext<T> {
    name: Arc<str>,
    execution_count: u64,
    started_at: DateTime<Utc>,
    completer: Completer<T>,
    logger: Logger,
    token: StopToken,
}

impl<T> JobContext<T> {
    /// Job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of runs of this job started before this one.
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// When this run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Logger named after the job.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Complete the run with `value`. Returns `false` if it was already settled.
    pub fn complete(&self, value: T) -> bool {
        self.completer.complete(value)
    }

    /// Fail the run with `error`. Returns `false` if it was already settled.
    pub fn fail(&self, error: impl Into<BoxError>) -> bool {
        self.completer.fail(error)
    }

    /// A completer that can be moved into other tasks to settle the run later.
    pub fn completer(&self) -> Completer<T> {
        self.completer.clone()
    }

    /// Subscribe to this run's stop signal. Only the first call succeeds.
    pub fn stop_listener(&self) -> Option<StopListener> {
        self.token.subscribe()
    }

    /// Whether a force stop was requested for this run.
    pub fn is_stop_requested(&self) -> bool {
        self.token.is_fired()
    }
}

/// A named job.
///
/// Cloning is cheap; clones share the same current run, so stopping through
/// one clone stops a run started through another.
pub struct Job<T> {
    name: Arc<str>,
    function: JobFn<T>,
    logger: Logger,
    config: JobConfig,
    current: Arc<Mutex<Option<StopToken>>>,
    executions: Arc<AtomicU64>,
}

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            function: self.function.clone(),
            logger: self.logger.clone(),
            config: self.config.clone(),
            current: self.current.clone(),
            executions: self.executions.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl<T: Send + 'static> Job<T> {
    /// Create a new job.
    ///
    /// The work function is called once per run. It settles the run through
    /// the context's `complete`/`fail`; returning `Err` fails the run too.
    ///
    /// ```
    /// use cadence_jobs::Job;
    ///
    /// let job = Job::new("MyJob", |ctx| async move {
    ///     ctx.complete("good job");
    ///     Ok(())
    /// });
    /// assert_eq!(job.name(), "MyJob");
    /// ```
    pub fn new<F, Fut>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(JobContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::with_config(name, JobConfig::default(), function)
    }

    /// Create a new job with custom configuration.
    pub fn with_config<F, Fut>(name: impl Into<String>, config: JobConfig, function: F) -> Self
    where
        F: Fn(JobContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let mut name = name.into();
        if name.is_empty() {
            name = UNNAMED_JOB.to_string();
        }
        let name: Arc<str> = name.into();

        let wrapped_fn: JobFn<T> = Arc::new(
            move |ctx: JobContext<T>| -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>> {
                Box::pin(function(ctx))
            },
        );

        Self {
            logger: Logger::new(name.clone()),
            name,
            function: wrapped_fn,
            config,
            current: Arc::new(Mutex::new(None)),
            executions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the job once and wait for its outcome.
    ///
    /// This does not consult any running set; use
    /// [`JobRunner::run_once`](crate::JobRunner::run_once) for that.
    pub async fn invoke(&self) -> JobResult<T> {
        self.invoke_unless(None).await
    }

    /// Like [`invoke`](Self::invoke), but fails with
    /// [`JobError::ForceStopped`] without calling the work when `forced` is
    /// already cancelled once the run is installed as current.
    pub(crate) async fn invoke_unless(&self, forced: Option<&CancellationToken>) -> JobResult<T> {
        let token = StopToken::new();
        let _scope = RunScope::enter(self, token.clone());
        if forced.is_some_and(CancellationToken::is_cancelled) {
            self.logger.debug("Stop requested before the run started");
            return Err(JobError::ForceStopped);
        }

        let (tx, mut rx) = oneshot::channel();
        let completer = Completer::new(tx, self.logger.clone());
        let settler = completer.downgrade();
        let ctx = JobContext {
            name: self.name.clone(),
            execution_count: self.executions.fetch_add(1, Ordering::SeqCst),
            started_at: Utc::now(),
            completer,
            logger: self.logger.clone(),
            token: token.clone(),
        };

        let mut work = tokio::spawn((self.function)(ctx));
        let mut work_done = false;
        let mut stop_seen = false;
        let mut orphaned = false;

        loop {
            let outcome = tokio::select! {
                biased;
                settled = &mut rx, if !orphaned => match settled {
                    Ok(outcome) => return outcome,
                    Err(_) if work_done => return Err(self.abandoned()),
                    // Every completer is gone; the work itself decides.
                    Err(_) => {
                        orphaned = true;
                        continue;
                    }
                },
                _ = token.woken(), if !stop_seen => {
                    stop_seen = true;
                    self.logger.debug("Stop requested, failing the current run");
                    Err(JobError::ForceStopped)
                }
                joined = &mut work, if !work_done => {
                    work_done = true;
                    match self.work_outcome(joined) {
                        Some(outcome) => outcome,
                        None if orphaned => return Err(self.abandoned()),
                        None => continue,
                    }
                }
            };

            if let Some(outcome) = settler.settle(outcome) {
                // An outcome may have landed just before the last completer went away.
                return rx.try_recv().unwrap_or(outcome);
            }
        }
    }

    fn work_outcome(
        &self,
        joined: Result<Result<(), BoxError>, JoinError>,
    ) -> Option<JobResult<T>> {
        match joined {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                self.logger.error(format!(
                    "Caught error running job {}. Error: {}",
                    self.name, e
                ));
                Some(Err(JobError::Failed(e)))
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                self.logger.error(format!(
                    "Caught panic running job {}. Panic: {}",
                    self.name, message
                ));
                Some(Err(JobError::Panicked(message)))
            }
            Err(e) => {
                self.logger
                    .error(format!("Job {} was cancelled: {}", self.name, e));
                Some(Err(JobError::failed(e)))
            }
        }
    }

    fn abandoned(&self) -> JobError {
        self.logger.error(format!(
            "Job {} finished without completing or failing",
            self.name
        ));
        JobError::Abandoned(self.name.to_string())
    }
}

impl<T> Job<T> {
    /// Job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logger named after the job.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Job configuration.
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Whether a run of this handle (or a clone) is in flight.
    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Total runs started so far.
    pub fn execution_count(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Force-stop the current run.
    ///
    /// The run fails with [`JobError::ForceStopped`] and the work function's
    /// stop listener receives the request. The returned [`StopAck`] resolves
    /// with the value the work acknowledges with.
    ///
    /// With no run in flight the job's [`IdleStop`] policy applies.
    pub fn stop(&self) -> JobResult<StopAck> {
        let current = self.current.lock().clone();
        match current {
            Some(token) => {
                debug!("Force-stopping job {}", self.name);
                Ok(token.fire())
            }
            None => match self.config.idle_stop {
                IdleStop::Ignore => {
                    debug!("Job {} is not running, nothing to stop", self.name);
                    Ok(StopAck::idle())
                }
                IdleStop::Reject => Err(JobError::NotRunning(self.name.to_string())),
            },
        }
    }
}

/// Installs a run's token as the job's current run and tears it down again,
/// whichever way the run ends.
struct RunScope<'a, T> {
    job: &'a Job<T>,
    token: StopToken,
}

impl<'a, T> RunScope<'a, T> {
    fn enter(job: &'a Job<T>, token: StopToken) -> Self {
        *job.current.lock() = Some(token.clone());
        Self { job, token }
    }
}

impl<T> Drop for RunScope<'_, T> {
    fn drop(&mut self) {
        let mut current = self.job.current.lock();
        if current.as_ref().is_some_and(|t| t.same_run(&self.token)) {
            *current = None;
        }
        drop(current);
        self.token.close();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
