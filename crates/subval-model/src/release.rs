use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file_type::{DataType, FileType};
use crate::report::Report;
use crate::state::SubmissionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    Opened,
    Closed,
    Completed,
}

/// A project waiting for validation in a release queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedProject {
    pub project_key: String,
    /// Addresses notified when the validation resolves.
    pub emails: Vec<String>,
    /// Data types requested for validation.
    pub data_types: Vec<DataType>,
}

impl QueuedProject {
    pub fn new(project_key: impl Into<String>, data_types: Vec<DataType>) -> Self {
        Self {
            project_key: project_key.into(),
            emails: Vec::new(),
            data_types,
        }
    }

    #[must_use]
    pub fn with_emails(mut self, emails: Vec<String>) -> Self {
        self.emails = emails;
        self
    }
}

/// The files one project uploaded for one release, with lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub project_key: String,
    pub release_name: String,
    pub state: SubmissionState,
    pub report: Report,
    pub last_updated: DateTime<Utc>,
}

impl Submission {
    pub fn new(project_key: impl Into<String>, release_name: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            release_name: release_name.into(),
            state: SubmissionState::NotValidated,
            report: Report::default(),
            last_updated: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// One file in a submission directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFile {
    pub name: String,
    pub path: PathBuf,
    /// `None` when the name matches no known file type.
    pub file_type: Option<FileType>,
}

impl SubmissionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let file_type = FileType::from_file_name(&name);
        Self {
            name,
            path,
            file_type,
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.file_type.map(FileType::data_type)
    }
}

/// A named validation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub state: ReleaseState,
    pub dictionary_version: String,
    pub submissions: BTreeMap<String, Submission>,
    pub queue: VecDeque<QueuedProject>,
    pub release_date: Option<DateTime<Utc>>,
}

impl Release {
    pub fn new(name: impl Into<String>, dictionary_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ReleaseState::Opened,
            dictionary_version: dictionary_version.into(),
            submissions: BTreeMap::new(),
            queue: VecDeque::new(),
            release_date: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ReleaseState::Opened
    }

    pub fn is_queued(&self, project_key: &str) -> bool {
        self.queue
            .iter()
            .any(|queued| queued.project_key == project_key)
    }

    pub fn next_in_queue(&self) -> Option<&QueuedProject> {
        self.queue.front()
    }

    /// Removes a project from the queue, returning its entry.
    pub fn dequeue(&mut self, project_key: &str) -> Option<QueuedProject> {
        let index = self
            .queue
            .iter()
            .position(|queued| queued.project_key == project_key)?;
        self.queue.remove(index)
    }

    pub fn signed_off_count(&self) -> usize {
        self.submissions
            .values()
            .filter(|submission| submission.state == SubmissionState::SignedOff)
            .count()
    }
}
