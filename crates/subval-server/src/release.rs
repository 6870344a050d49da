//! Release bookkeeping around the submission state machine.
//!
//! The scheduler only talks to [`ReleaseService`]. [`MemoryReleaseService`]
//! keeps releases in memory and reads submission files from a directory
//! tree:
//!
//! ```text
//! <root>/<release>/<project>/*.txt        submission files
//! <root>/<release>/<project>/deletions.txt
//! <root>/accepted/<project>/*.txt         previously accepted data
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use subval_core::{ClosePolicy, StateContext, SubmissionContext, SubmissionStateMachine};
use subval_ingest::discover_submission_files;
use subval_model::{
    DataType, Outcome, QueuedProject, Release, ReleaseState, Report, Submission, SubmissionFile,
    SubmissionState,
};
use subval_validate::kv::DELETION_FILE_NAME;
use subval_validate::{ValidationRequest, effective_data_types};
use tracing::{debug, info};

use crate::error::{Result, SchedulerError};

pub const ACCEPTED_DIR: &str = "accepted";

/// A project moved from the queue to `VALIDATING`.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub release_name: String,
    pub project: QueuedProject,
    pub request: ValidationRequest,
    /// Incoming report with the requested data types marked validating.
    pub report: Report,
}

pub trait ReleaseService: Send + Sync {
    fn count_open_releases(&self) -> Result<usize>;

    /// Snapshot of the open release.
    fn open_release(&self) -> Result<Release>;

    fn next_in_queue(&self) -> Result<Option<QueuedProject>>;

    /// Removes the project from the queue and starts its validation.
    fn dequeue_to_validating(&self, project_key: &str) -> Result<Admission>;

    fn submission(&self, project_key: &str) -> Result<Submission>;

    /// Finishes a validation, stores its report and returns the state the
    /// submission settled in.
    fn resolve(
        &self,
        project_key: &str,
        data_types: &[DataType],
        outcome: Outcome,
        report: Report,
    ) -> Result<SubmissionState>;

    /// Queues a validation request. Feature data types pull in clinical data.
    fn queue(&self, project: QueuedProject) -> Result<()>;

    /// Drops a queued request; `None` when the project was not queued.
    fn cancel_queued(&self, project_key: &str) -> Result<Option<QueuedProject>>;

    /// Closes the open release and opens `next_release`. Returns the closed release.
    fn release(&self, next_release: &str) -> Result<Release>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn release_dir(&self, release_name: &str) -> PathBuf {
        self.root.join(release_name)
    }

    pub fn submission_dir(&self, release_name: &str, project_key: &str) -> PathBuf {
        self.release_dir(release_name).join(project_key)
    }

    pub fn accepted_dir(&self, project_key: &str) -> PathBuf {
        self.root.join(ACCEPTED_DIR).join(project_key)
    }

    pub fn deletions_file(&self, release_name: &str, project_key: &str) -> PathBuf {
        self.submission_dir(release_name, project_key)
            .join(DELETION_FILE_NAME)
    }

    /// Project directories of a release, sorted. A missing release directory has none.
    pub fn project_keys(&self, release_name: &str) -> Result<Vec<String>> {
        let dir = self.release_dir(release_name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir).map_err(|source| {
            subval_ingest::IngestError::DirectoryRead {
                path: dir.clone(),
                source,
            }
        })?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| subval_ingest::IngestError::DirectoryRead {
                path: dir.clone(),
                source,
            })?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Files of a submission; an absent directory is an empty submission.
    pub fn submission_files(
        &self,
        release_name: &str,
        project_key: &str,
    ) -> Result<Vec<SubmissionFile>> {
        let dir = self.submission_dir(release_name, project_key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        Ok(discover_submission_files(&dir)?)
    }
}

/// In-memory releases over a [`StorageLayout`].
pub struct MemoryReleaseService {
    storage: StorageLayout,
    machine: SubmissionStateMachine,
    releases: Mutex<Vec<Release>>,
}

impl MemoryReleaseService {
    pub fn new(storage: StorageLayout) -> Self {
        Self {
            storage,
            machine: SubmissionStateMachine::new(),
            releases: Mutex::new(Vec::new()),
        }
    }

    /// Opens `release_name` and registers every project directory found under it.
    pub fn open(
        storage: StorageLayout,
        release_name: &str,
        dictionary_version: &str,
    ) -> Result<Self> {
        let service = Self::new(storage);
        service.add_release(Release::new(release_name, dictionary_version))?;
        for project_key in service.storage.project_keys(release_name)? {
            service.add_project(&project_key)?;
        }
        Ok(service)
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    pub fn add_release(&self, release: Release) -> Result<()> {
        let mut releases = self.lock();
        if releases.iter().any(|existing| existing.name == release.name) {
            return Err(SchedulerError::DuplicateRelease(release.name));
        }
        info!(release = %release.name, state = ?release.state, "release added");
        releases.push(release);
        Ok(())
    }

    /// Registers a project in the open release. Known projects are left alone.
    pub fn add_project(&self, project_key: &str) -> Result<()> {
        let mut releases = self.lock();
        let release = open_release_mut(&mut releases)?;
        if release.submissions.contains_key(project_key) {
            return Ok(());
        }
        let files = self.storage.submission_files(&release.name, project_key)?;
        let mut submission = Submission::new(project_key, release.name.clone());
        submission.report = Report::from_files(&files);
        debug!(
            release = %release.name,
            project = project_key,
            files = files.len(),
            "project registered"
        );
        release
            .submissions
            .insert(project_key.to_string(), submission);
        Ok(())
    }

    pub fn sign_off(&self, project_key: &str) -> Result<()> {
        self.with_submission(project_key, |machine, context| {
            machine.sign_off(context)?;
            Ok(())
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Release>> {
        self.releases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `operation` against a submission of the open release.
    fn with_submission<T>(
        &self,
        project_key: &str,
        operation: impl FnOnce(&SubmissionStateMachine, &mut SubmissionContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut releases = self.lock();
        let release = open_release_mut(&mut releases)?;
        let files = self.storage.submission_files(&release.name, project_key)?;
        let submission = release
            .submissions
            .get_mut(project_key)
            .ok_or_else(|| SchedulerError::UnknownProject(project_key.to_string()))?;
        let mut context = SubmissionContext::new(submission, files);
        operation(&self.machine, &mut context)
    }
}

fn open_release_mut(releases: &mut [Release]) -> Result<&mut Release> {
    releases
        .iter_mut()
        .find(|release| release.is_open())
        .ok_or(SchedulerError::NoOpenRelease)
}

impl ReleaseService for MemoryReleaseService {
    fn count_open_releases(&self) -> Result<usize> {
        Ok(self
            .lock()
            .iter()
            .filter(|release| release.is_open())
            .count())
    }

    fn open_release(&self) -> Result<Release> {
        let mut releases = self.lock();
        open_release_mut(&mut releases).map(|release| release.clone())
    }

    fn next_in_queue(&self) -> Result<Option<QueuedProject>> {
        let mut releases = self.lock();
        Ok(open_release_mut(&mut releases)?.next_in_queue().cloned())
    }

    fn dequeue_to_validating(&self, project_key: &str) -> Result<Admission> {
        let mut releases = self.lock();
        let release = open_release_mut(&mut releases)?;
        let release_name = release.name.clone();
        let project = release
            .queue
            .iter()
            .find(|queued| queued.project_key == project_key)
            .cloned()
            .ok_or_else(|| SchedulerError::NotQueued(project_key.to_string()))?;
        let files = self.storage.submission_files(&release_name, project_key)?;
        let submission = release
            .submissions
            .get_mut(project_key)
            .ok_or_else(|| SchedulerError::UnknownProject(project_key.to_string()))?;

        let mut report = Report::default();
        let mut context = SubmissionContext::new(submission, files.clone());
        self.machine
            .start_validation(&mut context, &project.data_types, &mut report)?;
        release.dequeue(project_key);

        let accepted = self.storage.accepted_dir(project_key);
        let deletions = self.storage.deletions_file(&release_name, project_key);
        let request = ValidationRequest {
            project_key: project_key.to_string(),
            data_types: project.data_types.clone(),
            files,
            existing_dir: accepted.is_dir().then_some(accepted),
            deletions: deletions.is_file().then_some(deletions),
        };
        info!(
            release = %release_name,
            project = project_key,
            data_types = ?project.data_types,
            "project dequeued for validation"
        );
        Ok(Admission {
            release_name,
            project,
            request,
            report,
        })
    }

    fn submission(&self, project_key: &str) -> Result<Submission> {
        let mut releases = self.lock();
        open_release_mut(&mut releases)?
            .submissions
            .get(project_key)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownProject(project_key.to_string()))
    }

    fn resolve(
        &self,
        project_key: &str,
        data_types: &[DataType],
        outcome: Outcome,
        report: Report,
    ) -> Result<SubmissionState> {
        self.with_submission(project_key, |machine, context| {
            machine.finish_validation(context, data_types, outcome, report)?;
            Ok(context.state())
        })
    }

    fn queue(&self, project: QueuedProject) -> Result<()> {
        let project = QueuedProject {
            data_types: effective_data_types(&project.data_types),
            ..project
        };
        let key = project.project_key.clone();
        {
            let releases = self.lock();
            let queued = releases
                .iter()
                .find(|release| release.is_open())
                .is_some_and(|release| release.is_queued(&key));
            if queued {
                return Err(SchedulerError::AlreadyQueued(key));
            }
        }
        self.with_submission(&key, |machine, context| {
            machine.queue_request(context, &project.data_types)?;
            Ok(())
        })?;
        let mut releases = self.lock();
        let release = open_release_mut(&mut releases)?;
        info!(
            release = %release.name,
            project = %key,
            data_types = ?project.data_types,
            position = release.queue.len(),
            "project queued"
        );
        release.queue.push_back(project);
        Ok(())
    }

    fn cancel_queued(&self, project_key: &str) -> Result<Option<QueuedProject>> {
        let project = {
            let mut releases = self.lock();
            open_release_mut(&mut releases)?.dequeue(project_key)
        };
        let Some(project) = project else {
            return Ok(None);
        };
        self.with_submission(project_key, |machine, context| {
            machine.cancel_validation(context, &project.data_types)?;
            Ok(())
        })?;
        info!(project = project_key, "queued validation cancelled");
        Ok(Some(project))
    }

    fn release(&self, next_release: &str) -> Result<Release> {
        let mut releases = self.lock();
        if releases.iter().any(|release| release.name == next_release) {
            return Err(SchedulerError::DuplicateRelease(next_release.to_string()));
        }
        let current = open_release_mut(&mut releases)?;
        let validating: Vec<String> = current
            .submissions
            .iter()
            .filter(|(_, submission)| submission.state == SubmissionState::Validating)
            .map(|(project_key, _)| project_key.clone())
            .collect();
        if !validating.is_empty() {
            return Err(SchedulerError::ValidationInProgress {
                release: current.name.clone(),
                projects: validating,
            });
        }
        if current.signed_off_count() == 0 {
            return Err(SchedulerError::NothingSignedOff(current.name.clone()));
        }

        let mut next = Release::new(next_release, current.dictionary_version.clone());
        for (project_key, submission) in &mut current.submissions {
            let files = self.storage.submission_files(&current.name, project_key)?;
            let policy = ClosePolicy::declared_for(submission.state);
            let context = SubmissionContext::new(submission, files);
            let carried = self.machine.close_release(&context, next_release, policy)?;
            next.submissions.insert(project_key.clone(), carried);
        }
        current.queue.clear();
        current.state = ReleaseState::Completed;
        current.release_date = Some(Utc::now());
        let closed = current.clone();
        info!(
            release = %closed.name,
            next = next_release,
            submissions = next.submissions.len(),
            "release completed"
        );
        releases.push(next);
        Ok(closed)
    }
}
