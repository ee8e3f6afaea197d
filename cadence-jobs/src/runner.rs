//! Run-once execution with per-name mutual exclusion.

use crate::error::{JobError, JobResult};
use crate::job::Job;
use cadence_log::trace;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Names of the jobs currently in flight.
///
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct RunningSet {
    names: Arc<Mutex<HashSet<String>>>,
}

impl RunningSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, or return `None` if it is already in flight.
    ///
    /// The name is released when the returned claim is dropped.
    pub fn claim(&self, name: &str) -> Option<RunClaim> {
        let mut names = self.names.lock();
        if names.contains(name) {
            return None;
        }
        names.insert(name.to_string());
        Some(RunClaim {
            names: self.names.clone(),
            name: name.to_string(),
        })
    }

    /// Whether `name` is in flight.
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    /// Number of names in flight.
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}

/// A name's membership in a [`RunningSet`], released on drop.
#[derive(Debug)]
pub struct RunClaim {
    names: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl RunClaim {
    /// The claimed name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.names.lock().remove(&self.name);
    }
}

/// Executes jobs, never running two jobs of the same name at once.
///
/// Each runner owns its own [`RunningSet`]; clones share it.
///
/// # Examples
///
/// ```
/// use cadence_jobs::{Job, JobRunner};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), cadence_jobs::JobError> {
/// let runner = JobRunner::new();
/// let job = Job::new("MyJob", |ctx| async move {
///     ctx.complete("good job");
///     Ok(())
/// });
///
/// assert_eq!(runner.run_once(&job).await?, "good job");
/// assert_eq!(runner.running_count(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct JobRunner {
    running: RunningSet,
}

impl JobRunner {
    /// Create a runner with an empty running set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner sharing an existing running set.
    pub fn with_running_set(running: RunningSet) -> Self {
        Self { running }
    }

    /// The running set this runner checks and updates.
    pub fn running_set(&self) -> &RunningSet {
        &self.running
    }

    /// Run `job` once.
    ///
    /// Fails with [`JobError::DuplicateRun`] without invoking the job when a
    /// job of the same name is already in flight. The name is released
    /// before the outcome is returned, on success and failure alike.
    pub async fn run_once<T: Send + 'static>(&self, job: &Job<T>) -> JobResult<T> {
        self.run_once_unless(job, None).await
    }

    /// `run_once` for a schedule; a cancelled `forced` token fails the run
    /// with [`JobError::ForceStopped`] before the work starts.
    pub(crate) async fn run_once_unless<T: Send + 'static>(
        &self,
        job: &Job<T>,
        forced: Option<&CancellationToken>,
    ) -> JobResult<T> {
        let Some(_claim) = self.running.claim(job.name()) else {
            let err = JobError::DuplicateRun(job.name().to_string());
            trace!("{}", err);
            return Err(err);
        };

        trace!("Running job: {}", job.name());
        job.invoke_unless(forced).await
    }

    /// Number of job names currently in flight.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Whether a job named `name` is in flight.
    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::job::JobContext;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    fn gated_job(name: &str, gate: Arc<Notify>, calls: Arc<AtomicU32>) -> Job<&'static str> {
        Job::new(name, move |ctx| {
            let (gate, calls) = (gate.clone(), calls.clone());
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                ctx.complete("done");
                Ok(())
            }
        })
    }

    #[test]
    fn test_claim_releases_on_drop() {
        let set = RunningSet::new();
        let claim = set.claim("a").expect("free name");
        assert_eq!(claim.name(), "a");
        assert!(set.contains("a"));
        assert!(set.claim("a").is_none());

        drop(claim);
        assert!(set.is_empty());
        assert!(set.claim("a").is_some());
    }

    #[tokio::test]
    async fn test_run_successful_job() {
        let runner = JobRunner::new();
        let job = Job::new("MyJob", |ctx| async move {
            ctx.complete("good job");
            Ok(())
        });

        assert_eq!(runner.run_once(&job).await.unwrap(), "good job");
        assert_eq!(runner.running_count(), 0);
    }

    #[tokio::test]
    async fn test_run_failing_job_releases_name() {
        let runner = JobRunner::new();
        let job = Job::new("MyJob", |ctx: JobContext<()>| async move {
            ctx.fail("blerf");
            Ok(())
        });

        assert_eq!(runner.run_once(&job).await.unwrap_err().to_string(), "blerf");
        assert_eq!(runner.running_count(), 0);

        let job = Job::new("MyJob", |_ctx: JobContext<()>| async move {
            Err(BoxError::from("blerf"))
        });
        assert_eq!(runner.run_once(&job).await.unwrap_err().to_string(), "blerf");
        assert!(!runner.is_running("MyJob"));
    }

    #[tokio::test]
    async fn test_duplicate_run_rejected_without_invoking() {
        let runner = JobRunner::new();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicU32::new(0));
        let job = gated_job("Exclusive", gate.clone(), calls.clone());

        let first = tokio::spawn({
            let (runner, job) = (runner.clone(), job.clone());
            async move { runner.run_once(&job).await }
        });
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(runner.is_running("Exclusive"));

        let err = runner.run_once(&job).await.unwrap_err();
        assert!(err.is_duplicate_run());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "done");
        assert_eq!(runner.running_count(), 0);
    }

    #[tokio::test]
    async fn test_same_name_different_handles_are_one_job() {
        let runner = JobRunner::new();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicU32::new(0));
        let first_job = gated_job("Shared", gate.clone(), calls.clone());
        let second_job = gated_job("Shared", gate.clone(), calls.clone());

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_once(&first_job).await }
        });
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(runner.run_once(&second_job).await.unwrap_err().is_duplicate_run());
        gate.notify_one();
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_different_names_overlap() {
        let runner = JobRunner::new();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicU32::new(0));
        let a = gated_job("A", gate.clone(), calls.clone());
        let b = gated_job("B", gate.clone(), calls.clone());

        let run_a = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_once(&a).await }
        });
        let run_b = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_once(&b).await }
        });
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(runner.running_count(), 2);

        gate.notify_waiters();
        run_a.await.unwrap().unwrap();
        run_b.await.unwrap().unwrap();
        assert_eq!(runner.running_count(), 0);
    }

    #[tokio::test]
    async fn test_runners_do_not_share_state() {
        let first = JobRunner::new();
        let second = JobRunner::new();
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicU32::new(0));
        let job = gated_job("Isolated", gate.clone(), calls.clone());

        let run = tokio::spawn({
            let (runner, job) = (first.clone(), job.clone());
            async move { runner.run_once(&job).await }
        });
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(first.running_count(), 1);
        assert_eq!(second.running_count(), 0);

        gate.notify_one();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shared_running_set() {
        let set = RunningSet::new();
        let runner = JobRunner::with_running_set(set.clone());
        let _claim = set.claim("Held").unwrap();

        let job = Job::new("Held", |ctx| async move {
            ctx.complete(());
            Ok(())
        });
        assert!(runner.run_once(&job).await.unwrap_err().is_duplicate_run());
        assert_eq!(runner.running_set().len(), 1);
    }

    #[tokio::test]
    async fn test_force_stop_releases_name() {
        let runner = JobRunner::new();
        let started = Arc::new(Notify::new());
        let started_clone = started.clone();
        let job = Job::new("Stoppable", move |ctx: JobContext<()>| {
            let started = started_clone.clone();
            async move {
                let listener = ctx.stop_listener().unwrap();
                started.notify_one();
                if let Some(request) = listener.wait().await {
                    request.acknowledge(true);
                }
                Ok(())
            }
        });

        let run = tokio::spawn({
            let (runner, job) = (runner.clone(), job.clone());
            async move { runner.run_once(&job).await }
        });
        started.notified().await;
        assert_eq!(runner.running_count(), 1);

        let ack = job.stop().unwrap();
        assert!(run.await.unwrap().unwrap_err().is_force_stop());
        assert_eq!(ack.await, Some(serde_json::Value::Bool(true)));
        assert_eq!(runner.running_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_run_releases_name() {
        let runner = JobRunner::new();
        let job = Job::new("Forever", |_ctx: JobContext<()>| async move {
            std::future::pending::<()>().await;
            Ok(())
        });

        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(10), runner.run_once(&job)).await;
        assert!(outcome.is_err());
        assert_eq!(runner.running_count(), 0);
        assert!(!job.is_running());
    }
}
