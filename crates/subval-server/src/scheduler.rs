//! Validation scheduler.
//!
//! One poll per interval: check that exactly one release is open, take the
//! head of its queue if an admission slot is free, and hand the submission
//! to a blocking worker. Slots are semaphore permits. A permit is acquired
//! before the dequeue and moves into the worker task, so it is returned
//! once the submission is resolved, whichever way the worker ends.
//!
//! Completion paths:
//!
//! | worker result                    | outcome     | submission state |
//! |----------------------------------|-------------|------------------|
//! | pipeline completed               | `COMPLETED` | VALID / INVALID  |
//! | structurally invalid             | `COMPLETED` | INVALID          |
//! | stopped by `cancel_validation`   | `CANCELLED` | from the report  |
//! | stopped by shutdown              | `ABORTED`   | from the report  |
//! | error or panic                   | `FAILED`    | ERROR            |

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use subval_model::{Outcome, QueuedProject, Report, SubmissionState};
use subval_validate::{
    CancellationFlag, PipelineConfig, PipelineOutcome, StopReason, ValidateError,
    ValidationPipeline, ValidationRequest,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ServerConfig;
use crate::error::{Result, SchedulerError};
use crate::mail::MailService;
use crate::release::{Admission, ReleaseService};

/// Runs one submission's validation on a blocking worker thread.
pub trait SubmissionValidator: Send + Sync + 'static {
    fn validate(
        &self,
        request: &ValidationRequest,
        report: Report,
        cancel: &CancellationFlag,
    ) -> subval_validate::Result<PipelineOutcome>;
}

/// The production validator: the full validation pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineValidator {
    pipeline: ValidationPipeline,
}

impl PipelineValidator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            pipeline: ValidationPipeline::new(config),
        }
    }
}

impl SubmissionValidator for PipelineValidator {
    fn validate(
        &self,
        request: &ValidationRequest,
        report: Report,
        cancel: &CancellationFlag,
    ) -> subval_validate::Result<PipelineOutcome> {
        self.pipeline.run(request, report, cancel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_simultaneous: usize,
    pub poll_interval: Duration,
    /// Copied on every ERROR notification.
    pub admin: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SchedulerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_simultaneous: config.validator.max_simultaneous.max(1),
            poll_interval: config.validator.poll_interval(),
            admin: config.mail.admin.clone(),
        }
    }
}

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    NoOpenRelease,
    /// The queue is empty.
    Idle,
    /// A project is waiting but every slot is taken.
    Busy,
    Admitted(String),
    /// The poll failed; the failure was logged and reported.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// The project was still queued and has been removed.
    Dequeued,
    /// The running validation was asked to stop.
    Signalled,
    NotFound,
}

struct PollFailure {
    project: Option<QueuedProject>,
    cause: FailureCause,
}

enum FailureCause {
    Error(SchedulerError),
    Panic(String),
}

impl PollFailure {
    fn error(project: Option<&QueuedProject>, error: SchedulerError) -> Self {
        Self {
            project: project.cloned(),
            cause: FailureCause::Error(error),
        }
    }

    fn message(&self) -> String {
        match &self.cause {
            FailureCause::Error(error) => error.to_string(),
            FailureCause::Panic(message) => format!("panic: {message}"),
        }
    }
}

#[derive(Clone)]
pub struct ValidationScheduler {
    config: SchedulerConfig,
    releases: Arc<dyn ReleaseService>,
    mail: Arc<dyn MailService>,
    validator: Arc<dyn SubmissionValidator>,
    slots: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<String, CancellationFlag>>>,
    workers: Arc<Mutex<JoinSet<()>>>,
}

impl ValidationScheduler {
    pub fn new(
        config: SchedulerConfig,
        releases: Arc<dyn ReleaseService>,
        mail: Arc<dyn MailService>,
        validator: Arc<dyn SubmissionValidator>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_simultaneous));
        Self {
            config,
            releases,
            mail,
            validator,
            slots,
            in_flight: Arc::default(),
            workers: Arc::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Slots currently held by running validations.
    pub fn validating_count(&self) -> usize {
        self.config.max_simultaneous - self.slots.available_permits()
    }

    /// Polls until `shutdown` resolves, then aborts running validations and
    /// waits for them to resolve.
    ///
    /// # Errors
    ///
    /// Fails when more than one release is open.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            max_simultaneous = self.config.max_simultaneous,
            poll_interval_ms = self.config.poll_interval.as_millis(),
            "validation scheduler started"
        );

        let result = loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("validation scheduler shutting down");
                    break Ok(());
                }
                _ = interval.tick() => {
                    if let Err(error) = self.tick() {
                        error!(%error, "validation scheduler stopped");
                        break Err(error);
                    }
                }
            }
        };
        self.shutdown().await;
        result
    }

    /// One poll. Only a broken release configuration is returned as an error;
    /// every other failure is logged, mailed to support and swallowed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn tick(&self) -> Result<Tick> {
        self.reap_finished();
        match catch_unwind(AssertUnwindSafe(|| self.poll())) {
            Ok(Ok(tick)) => Ok(tick),
            Ok(Err(PollFailure {
                cause: FailureCause::Error(SchedulerError::OpenReleaseCount(count)),
                ..
            })) => Err(SchedulerError::OpenReleaseCount(count)),
            Ok(Err(failure)) => {
                self.polling_failed(failure.project.as_ref(), &failure.message());
                Ok(Tick::Failed)
            }
            Err(payload) => {
                let message = format!("panic: {}", panic_message(payload.as_ref()));
                self.polling_failed(None, &message);
                Ok(Tick::Failed)
            }
        }
    }

    fn poll(&self) -> std::result::Result<Tick, PollFailure> {
        let count = self
            .releases
            .count_open_releases()
            .map_err(|error| PollFailure::error(None, error))?;
        match count {
            0 => {
                debug!("waiting for an open release");
                return Ok(Tick::NoOpenRelease);
            }
            1 => {}
            count => {
                return Err(PollFailure::error(
                    None,
                    SchedulerError::OpenReleaseCount(count),
                ));
            }
        }

        let next = self
            .releases
            .next_in_queue()
            .map_err(|error| PollFailure::error(None, error))?;
        let Some(project) = next else {
            return Ok(Tick::Idle);
        };
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            debug!(project = %project.project_key, "no free validation slot");
            return Ok(Tick::Busy);
        };

        match catch_unwind(AssertUnwindSafe(|| self.admit(&project, permit))) {
            Ok(Ok(())) => Ok(Tick::Admitted(project.project_key)),
            Ok(Err(error)) => Err(PollFailure::error(Some(&project), error)),
            Err(payload) => Err(PollFailure {
                project: Some(project),
                cause: FailureCause::Panic(panic_message(payload.as_ref())),
            }),
        }
    }

    fn admit(&self, project: &QueuedProject, permit: OwnedSemaphorePermit) -> Result<()> {
        let admission = self.releases.dequeue_to_validating(&project.project_key)?;
        let cancel = CancellationFlag::new();
        self.in_flight_flags()
            .insert(project.project_key.clone(), cancel.clone());
        info!(
            release = %admission.release_name,
            project = %project.project_key,
            validating = self.validating_count(),
            "validation admitted"
        );
        self.mail.send_validation_started(
            &admission.release_name,
            &project.project_key,
            &project.emails,
        );

        let span = info_span!(
            "validation",
            project = %project.project_key,
            release = %admission.release_name
        );
        let scheduler = self.clone();
        let worker = async move {
            let _permit = permit;
            scheduler.validate(admission, cancel).await;
        };
        self.workers_set().spawn(worker.instrument(span));
        Ok(())
    }

    async fn validate(&self, admission: Admission, cancel: CancellationFlag) {
        let Admission {
            release_name,
            project,
            request,
            report,
        } = admission;
        let fallback = report.clone();
        let validator = Arc::clone(&self.validator);
        let flag = cancel.clone();
        let span = tracing::Span::current();
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = span.enter();
            validator.validate(&request, report, &flag)
        })
        .await;

        let (outcome, report) = completion(joined, fallback);
        self.complete(&release_name, &project, outcome, report);
    }

    fn complete(&self, release_name: &str, project: &QueuedProject, outcome: Outcome, report: Report) {
        self.in_flight_flags().remove(&project.project_key);
        let state = match self.releases.resolve(
            &project.project_key,
            &project.data_types,
            outcome,
            report,
        ) {
            Ok(state) => state,
            Err(error) => {
                error!(project = %project.project_key, %outcome, %error, "failed to resolve validation");
                self.mail.send_support_problem(
                    "failed to resolve validation",
                    &format!("{}: {error}", project.project_key),
                );
                return;
            }
        };
        info!(project = %project.project_key, %outcome, %state, "validation resolved");
        self.notify(release_name, project, state);
    }

    fn notify(&self, release_name: &str, project: &QueuedProject, state: SubmissionState) {
        let mut recipients = project.emails.clone();
        if state == SubmissionState::Error
            && let Some(admin) = &self.config.admin
            && !recipients.contains(admin)
        {
            recipients.push(admin.clone());
        }
        if recipients.is_empty() {
            return;
        }
        self.mail
            .send_validation_result(release_name, &project.project_key, &recipients, state);
    }

    /// Resolves the project the failed poll was working on as ERROR. A project
    /// that never left the queue is dropped from it instead.
    fn polling_failed(&self, project: Option<&QueuedProject>, message: &str) {
        error!(
            project = project.map(|project| project.project_key.as_str()),
            message, "validation polling failed"
        );
        self.mail
            .send_support_problem("validation polling failed", message);
        let Some(project) = project else {
            return;
        };
        self.in_flight_flags().remove(&project.project_key);
        match self.releases.resolve(
            &project.project_key,
            &project.data_types,
            Outcome::Failed,
            Report::default(),
        ) {
            Ok(state) => {
                let release_name = self
                    .releases
                    .open_release()
                    .map(|release| release.name)
                    .unwrap_or_default();
                self.notify(&release_name, project, state);
            }
            Err(error) => {
                warn!(project = %project.project_key, %error, "project was not validating, dropping it from the queue");
                if let Err(error) = self.releases.cancel_queued(&project.project_key) {
                    error!(project = %project.project_key, %error, "failed to drop project from the queue");
                }
            }
        }
    }

    /// Stops a queued or running validation.
    pub fn cancel_validation(&self, project_key: &str) -> Result<Cancellation> {
        if let Some(flag) = self.in_flight_flags().get(project_key) {
            flag.cancel();
            info!(project = project_key, "running validation asked to stop");
            return Ok(Cancellation::Signalled);
        }
        match self.releases.cancel_queued(project_key)? {
            Some(_) => Ok(Cancellation::Dequeued),
            None => Ok(Cancellation::NotFound),
        }
    }

    /// Aborts every running validation and waits until all are resolved.
    pub async fn shutdown(&self) {
        let flags: Vec<CancellationFlag> = self.in_flight_flags().values().cloned().collect();
        if !flags.is_empty() {
            info!(running = flags.len(), "aborting running validations");
        }
        for flag in flags {
            flag.abort();
        }
        self.wait_idle().await;
    }

    /// Waits until every admitted validation is resolved.
    pub async fn wait_idle(&self) {
        loop {
            let mut workers = std::mem::take(&mut *self.workers_set());
            if workers.is_empty() {
                return;
            }
            while let Some(joined) = workers.join_next().await {
                log_worker_exit(joined);
            }
        }
    }

    fn reap_finished(&self) {
        let mut workers = self.workers_set();
        while let Some(joined) = workers.try_join_next() {
            log_worker_exit(joined);
        }
    }

    fn in_flight_flags(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationFlag>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn workers_set(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps what the worker returned to an outcome and the report to merge.
fn completion(
    joined: std::result::Result<subval_validate::Result<PipelineOutcome>, JoinError>,
    fallback: Report,
) -> (Outcome, Report) {
    match joined {
        Ok(Ok(outcome)) => {
            if let PipelineOutcome::StructurallyInvalid(_) = &outcome {
                info!("submission is structurally invalid");
            }
            (Outcome::Completed, outcome.into_report())
        }
        Ok(Err(ValidateError::Stopped(StopReason::Cancelled))) => (Outcome::Cancelled, fallback),
        Ok(Err(ValidateError::Stopped(StopReason::Aborted))) => (Outcome::Aborted, fallback),
        Ok(Err(error)) => {
            error!(%error, "validation failed");
            (Outcome::Failed, fallback)
        }
        Err(error) => {
            error!(%error, "validation worker panicked");
            (Outcome::Failed, fallback)
        }
    }
}

fn log_worker_exit(joined: std::result::Result<(), JoinError>) {
    if let Err(error) = joined {
        error!(%error, "validation task ended abnormally");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
