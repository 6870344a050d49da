//! Storage fixtures and scripted collaborators for scheduler tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use subval_model::{ErrorType, FileType, Report, ReportError, SubmissionState};
use subval_server::{MailService, MemoryReleaseService, StorageLayout, SubmissionValidator};
use subval_validate::{CancellationFlag, PipelineOutcome, ValidateError, ValidationRequest};
use tempfile::TempDir;

pub const RELEASE: &str = "release1";

pub const DONOR_HEADER: &str = "donor_id\tdonor_sex";
pub const SPECIMEN_HEADER: &str = "donor_id\tspecimen_id\tspecimen_type";
pub const SAMPLE_HEADER: &str = "analyzed_sample_id\tspecimen_id\tanalyzed_sample_type";

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> StorageLayout {
        StorageLayout::new(self.dir.path())
    }

    /// Writes `<root>/<sub>/<name>`.
    pub fn write(&self, sub: &str, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let dir = self.dir.path().join(sub);
        fs::create_dir_all(&dir).expect("create dir");
        let mut contents = String::from(header);
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        let path = dir.join(name);
        fs::write(&path, contents).expect("write file");
        path
    }

    /// A consistent clinical submission for `project` in the test release.
    pub fn clinical(&self, project: &str) {
        let sub = format!("{RELEASE}/{project}");
        self.write(&sub, "donor.txt", DONOR_HEADER, &["D1\tmale", "D2\tfemale"]);
        self.write(
            &sub,
            "specimen.txt",
            SPECIMEN_HEADER,
            &["D1\tSP1\tnormal", "D2\tSP2\ttumour"],
        );
        self.write(
            &sub,
            "sample.txt",
            SAMPLE_HEADER,
            &["SA1\tSP1\tdna", "SA2\tSP2\tdna"],
        );
    }

    /// Opens the test release with a clinical submission per project.
    pub fn service(&self, projects: &[&str]) -> Arc<MemoryReleaseService> {
        for project in projects {
            self.clinical(project);
        }
        Arc::new(
            MemoryReleaseService::open(self.storage(), RELEASE, "0.1").expect("open release"),
        )
    }
}

/// A latch opened once by the test.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().expect("gate lock") = true;
        self.opened.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().expect("gate lock");
        while !*open {
            open = self.opened.wait(open).expect("gate wait");
        }
    }
}

#[derive(Clone)]
pub enum Behavior {
    /// Returns the incoming report untouched.
    Pass,
    /// Adds one relation error to `specimen.txt`.
    RowError,
    /// Reports `specimen.txt` as missing.
    Structural,
    /// Fails with an I/O error.
    Fail,
    Panic,
    /// Polls the cancellation flag until a stop is requested.
    UntilStopped,
    /// Waits for the gate, then passes.
    Gated(Arc<Gate>),
}

/// Validator whose result is chosen per project.
#[derive(Default)]
pub struct ScriptedValidator {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub fn with(self, project: &str, behavior: Behavior) -> Self {
        self.behaviors
            .lock()
            .expect("behaviors lock")
            .insert(project.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl SubmissionValidator for ScriptedValidator {
    fn validate(
        &self,
        request: &ValidationRequest,
        mut report: Report,
        cancel: &CancellationFlag,
    ) -> subval_validate::Result<PipelineOutcome> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(request.project_key.clone());
        let behavior = self
            .behaviors
            .lock()
            .expect("behaviors lock")
            .get(&request.project_key)
            .cloned()
            .unwrap_or(Behavior::Pass);
        match behavior {
            Behavior::Pass => Ok(PipelineOutcome::Completed(report)),
            Behavior::RowError => {
                report.add_error(
                    ReportError::new("specimen.txt", FileType::Specimen, ErrorType::Relation, 3)
                        .with_fields(["donor_id"])
                        .with_value("D9"),
                );
                Ok(PipelineOutcome::Completed(report))
            }
            Behavior::Structural => {
                report.add_error(ReportError::new(
                    "specimen.txt",
                    FileType::Specimen,
                    ErrorType::MissingFile,
                    0,
                ));
                report.refresh_state();
                Ok(PipelineOutcome::StructurallyInvalid(report))
            }
            Behavior::Fail => Err(ValidateError::Io {
                path: PathBuf::from("donor.txt"),
                source: std::io::Error::other("disk gone"),
            }),
            Behavior::Panic => panic!("validator bug"),
            Behavior::UntilStopped => loop {
                cancel.check()?;
                std::thread::sleep(Duration::from_millis(5));
            },
            Behavior::Gated(gate) => {
                gate.wait();
                Ok(PipelineOutcome::Completed(report))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Started {
        project: String,
        recipients: Vec<String>,
    },
    Result {
        project: String,
        recipients: Vec<String>,
        state: SubmissionState,
    },
    Support {
        subject: String,
    },
}

#[derive(Default)]
pub struct RecordingMail {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMail {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("mail lock").clone()
    }

    pub fn results(&self) -> Vec<(String, Vec<String>, SubmissionState)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Result {
                    project,
                    recipients,
                    state,
                } => Some((project, recipients, state)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().expect("mail lock").push(sent);
    }
}

impl MailService for RecordingMail {
    fn send_validation_started(&self, _release_name: &str, project_key: &str, recipients: &[String]) {
        self.record(Sent::Started {
            project: project_key.to_string(),
            recipients: recipients.to_vec(),
        });
    }

    fn send_validation_result(
        &self,
        _release_name: &str,
        project_key: &str,
        recipients: &[String],
        state: SubmissionState,
    ) {
        self.record(Sent::Result {
            project: project_key.to_string(),
            recipients: recipients.to_vec(),
            state,
        });
    }

    fn send_support_problem(&self, subject: &str, _message: &str) {
        self.record(Sent::Support {
            subject: subject.to_string(),
        });
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
