//! Tests for file type classification and lifecycle enums.

use subval_model::{
    DataType, FileType, QueuedProject, Release, ReportState, SubmissionFile, SubmissionState,
};

#[test]
fn file_names_map_to_file_types() {
    assert_eq!(FileType::from_file_name("donor.txt"), Some(FileType::Donor));
    assert_eq!(
        FileType::from_file_name("SSM_P.2024-01.txt"),
        Some(FileType::SsmP)
    );
    assert_eq!(FileType::from_file_name("exp_g.txt"), Some(FileType::ExpG));
    assert_eq!(FileType::from_file_name("donors.txt"), None);
    assert_eq!(FileType::from_file_name("ssm_p.tsv"), None);
    assert_eq!(FileType::from_file_name("deletions.txt"), None);
}

#[test]
fn every_file_type_belongs_to_its_data_type() {
    for data_type in DataType::ALL {
        for file_type in data_type.file_types() {
            assert_eq!(file_type.data_type(), data_type, "{file_type}");
        }
    }
    let listed: usize = DataType::ALL.iter().map(|dt| dt.file_types().len()).sum();
    assert_eq!(listed, FileType::ALL.len());
}

#[test]
fn data_types_parse_case_insensitively() {
    assert_eq!("SSM".parse::<DataType>().ok(), Some(DataType::Ssm));
    assert_eq!(" clinical ".parse::<DataType>().ok(), Some(DataType::Clinical));
    assert!("bogus".parse::<DataType>().is_err());
}

#[test]
fn only_validating_is_read_only() {
    for state in SubmissionState::ALL {
        assert_eq!(
            state.is_read_only(),
            state == SubmissionState::Validating,
            "{state}"
        );
    }
}

#[test]
fn report_state_aggregation_precedence() {
    use ReportState::{Error, Invalid, NotValidated, Valid, Validating};

    assert_eq!(ReportState::aggregate([Valid, Valid]), Valid);
    assert_eq!(ReportState::aggregate([Valid, NotValidated]), NotValidated);
    assert_eq!(ReportState::aggregate([Valid, Invalid, Validating]), Invalid);
    assert_eq!(ReportState::aggregate([Invalid, Error]), Error);
    assert_eq!(ReportState::aggregate([]), NotValidated);
}

#[test]
fn submission_file_classifies_from_path() {
    let file = SubmissionFile::new("/data/release1/p1/cnsm_s.txt");
    assert_eq!(file.name, "cnsm_s.txt");
    assert_eq!(file.data_type(), Some(DataType::Cnsm));
}

#[test]
fn release_queue_is_fifo_and_dequeues_by_key() {
    let mut release = Release::new("release1", "0.1");
    release
        .queue
        .push_back(QueuedProject::new("p1", vec![DataType::Clinical]));
    release
        .queue
        .push_back(QueuedProject::new("p2", vec![DataType::Ssm]));

    assert_eq!(
        release.next_in_queue().map(|queued| queued.project_key.as_str()),
        Some("p1")
    );
    assert!(release.is_queued("p2"));
    let removed = release.dequeue("p2").expect("p2 queued");
    assert_eq!(removed.data_types, vec![DataType::Ssm]);
    assert!(!release.is_queued("p2"));
    assert_eq!(release.queue.len(), 1);
}
