//! Tests for the report tree operations.

use subval_model::{
    DataType, ErrorType, FileType, MAX_ERROR_SAMPLES, Report, ReportError, ReportState,
    SubmissionFile,
};

fn files(names: &[&str]) -> Vec<SubmissionFile> {
    names
        .iter()
        .map(|name| SubmissionFile::new(format!("/submissions/p1/{name}")))
        .collect()
}

fn unique_new(file_name: &str, line: u64, value: &str) -> ReportError {
    ReportError::new(file_name, FileType::Donor, ErrorType::UniqueNew, line)
        .with_fields(["donor_id"])
        .with_value(value)
}

// --- building and refreshing ---

#[test]
fn from_files_groups_by_data_type_and_skips_unknown_files() {
    let report = Report::from_files(&files(&[
        "ssm_p.txt",
        "donor.txt",
        "notes.txt",
        "ssm_m.txt",
        "specimen.txt",
    ]));

    let data_types: Vec<DataType> = report
        .data_type_reports
        .iter()
        .map(|report| report.data_type)
        .collect();
    assert_eq!(data_types, vec![DataType::Clinical, DataType::Ssm]);
    assert_eq!(report.files().count(), 4);
    assert!(report.file_report("notes.txt").is_none());
    assert!(
        report
            .files()
            .all(|file| file.state == ReportState::NotValidated)
    );
}

#[test]
fn refresh_files_reports_changed_data_types() {
    let mut report = Report::from_files(&files(&["donor.txt", "ssm_m.txt", "ssm_p.txt"]));

    let changed = report.refresh_files(&files(&["donor.txt", "ssm_m.txt", "cnsm_m.txt"]));

    assert!(changed.contains(&DataType::Ssm));
    assert!(changed.contains(&DataType::Cnsm));
    assert!(!changed.contains(&DataType::Clinical));
    assert!(report.file_report("ssm_p.txt").is_none());
    assert!(report.file_report("cnsm_m.txt").is_some());
}

#[test]
fn refresh_files_drops_empty_data_types() {
    let mut report = Report::from_files(&files(&["donor.txt", "jcn_m.txt"]));
    report.refresh_files(&files(&["donor.txt"]));
    assert!(report.data_type_report(DataType::Jcn).is_none());
}

#[test]
fn add_and_remove_single_files() {
    let mut report = Report::default();
    report.add_file(FileType::Donor, "donor.txt");
    report.add_file(FileType::Donor, "donor.txt");
    report.add_file(FileType::JcnM, "jcn_m.txt");
    assert_eq!(report.files().count(), 2);

    assert_eq!(report.remove_file("jcn_m.txt"), Some(DataType::Jcn));
    assert_eq!(report.remove_file("jcn_m.txt"), None);
    assert!(report.data_type_report(DataType::Jcn).is_none());
    assert!(report.file_report("donor.txt").is_some());
}

// --- errors ---

#[test]
fn add_error_aggregates_by_type_and_fields() {
    let mut report = Report::from_files(&files(&["donor.txt"]));
    report.add_error(unique_new("donor.txt", 3, "D1"));
    report.add_error(unique_new("donor.txt", 5, "D2"));

    let file = report.file_report("donor.txt").expect("donor report");
    assert_eq!(file.error_reports.len(), 1);
    let field = &file.error_reports[0].field_error_reports[0];
    assert_eq!(field.count, 2);
    assert_eq!(field.line_numbers, vec![3, 5]);
    assert_eq!(field.values, vec!["D1".to_string(), "D2".to_string()]);
    assert_eq!(report.error_count(), 2);
    assert!(report.has_errors());
}

#[test]
fn add_error_caps_samples_but_keeps_counting() {
    let mut report = Report::from_files(&files(&["donor.txt"]));
    for line in 0..(MAX_ERROR_SAMPLES as u64 + 10) {
        report.add_error(unique_new("donor.txt", line + 2, "D"));
    }
    let file = report.file_report("donor.txt").expect("donor report");
    let field = &file.error_reports[0].field_error_reports[0];
    assert_eq!(field.line_numbers.len(), MAX_ERROR_SAMPLES);
    assert_eq!(field.count, MAX_ERROR_SAMPLES as u64 + 10);
}

#[test]
fn add_error_creates_report_for_missing_file() {
    let mut report = Report::default();
    report.add_error(ReportError::new(
        "ssm_p.txt",
        FileType::SsmP,
        ErrorType::MissingFile,
        0,
    ));
    assert!(report.data_type_report(DataType::Ssm).is_some());
    assert_eq!(report.error_count(), 1);
}

// --- state handling ---

#[test]
fn refresh_state_settles_validating_files() {
    let mut report = Report::from_files(&files(&["donor.txt", "ssm_m.txt", "ssm_p.txt"]));
    report.notify_validating(&[DataType::Clinical, DataType::Ssm]);
    report.add_error(unique_new("donor.txt", 2, "D1"));

    report.refresh_state();

    let states = report.data_type_states();
    assert_eq!(states[&DataType::Clinical], ReportState::Invalid);
    assert_eq!(states[&DataType::Ssm], ReportState::Valid);
    assert!(!report.is_valid());
}

#[test]
fn refresh_state_leaves_untouched_data_types() {
    let mut report = Report::from_files(&files(&["donor.txt", "ssm_m.txt"]));
    report.notify_validating(&[DataType::Clinical]);
    report.refresh_state();

    let states = report.data_type_states();
    assert_eq!(states[&DataType::Clinical], ReportState::Valid);
    assert_eq!(states[&DataType::Ssm], ReportState::NotValidated);
}

#[test]
fn reset_data_types_clears_errors_of_named_types_only() {
    let mut report = Report::from_files(&files(&["donor.txt", "ssm_m.txt"]));
    report.add_error(unique_new("donor.txt", 2, "D1"));
    report.add_error(ReportError::new(
        "ssm_m.txt",
        FileType::SsmM,
        ErrorType::Relation,
        4,
    ));
    report.refresh_state();

    report.reset_data_types(&[DataType::Clinical]);

    assert_eq!(report.error_count(), 1);
    let states = report.data_type_states();
    assert_eq!(states[&DataType::Clinical], ReportState::NotValidated);
    assert_eq!(states[&DataType::Ssm], ReportState::Invalid);
}

#[test]
fn is_valid_requires_every_data_type_valid() {
    let mut report = Report::from_files(&files(&["donor.txt", "ssm_m.txt"]));
    assert!(!report.is_valid());
    report.notify_validating(&[DataType::Clinical, DataType::Ssm]);
    report.refresh_state();
    assert!(report.is_valid());
    assert!(!Report::default().is_valid());
}

#[test]
fn merge_report_replaces_only_named_data_types() {
    let listing = files(&["donor.txt", "ssm_m.txt"]);
    let mut live = Report::from_files(&listing);
    live.add_error(unique_new("donor.txt", 2, "D1"));
    live.refresh_state();

    let mut incoming = Report::from_files(&listing);
    incoming.notify_validating(&[DataType::Ssm]);
    incoming.refresh_state();

    live.merge_report(incoming, &[DataType::Ssm]);

    let states = live.data_type_states();
    assert_eq!(states[&DataType::Clinical], ReportState::Invalid);
    assert_eq!(states[&DataType::Ssm], ReportState::Valid);
    assert_eq!(live.error_count(), 1);
}

#[test]
fn notify_error_marks_whole_subtree() {
    let mut report = Report::from_files(&files(&["ssm_m.txt", "ssm_p.txt"]));
    report.notify_error(&[DataType::Ssm]);
    assert!(report.files().all(|file| file.state == ReportState::Error));
}

// --- serialized shape ---

#[test]
fn serialized_report_shape_is_stable() {
    let mut report = Report::from_files(&files(&["donor.txt"]));
    report.notify_validating(&[DataType::Clinical]);
    report.add_error(unique_new("donor.txt", 3, "D1"));
    report.refresh_state();

    insta::assert_json_snapshot!(report, @r#"
    {
      "dataTypeReports": [
        {
          "dataType": "CLINICAL",
          "state": "INVALID",
          "fileTypeReports": [
            {
              "fileType": "DONOR",
              "state": "INVALID",
              "fileReports": [
                {
                  "fileName": "donor.txt",
                  "fileType": "DONOR",
                  "state": "INVALID",
                  "fieldReports": [],
                  "errorReports": [
                    {
                      "errorType": "UNIQUE_NEW",
                      "fieldErrorReports": [
                        {
                          "fieldNames": [
                            "donor_id"
                          ],
                          "parameters": {},
                          "count": 1,
                          "lineNumbers": [
                            3
                          ],
                          "values": [
                            "D1"
                          ]
                        }
                      ]
                    }
                  ]
                }
              ]
            }
          ]
        }
      ]
    }
    "#);
}
