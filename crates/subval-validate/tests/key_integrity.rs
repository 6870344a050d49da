//! Tests for the key integrity validator.

mod common;

use common::{
    DONOR_HEADER, Fixture, SAMPLE_HEADER, SPECIMEN_HEADER, SSM_M_HEADER, SSM_P_HEADER,
};
use proptest::prelude::*;
use subval_model::{ErrorType, FileType};
use subval_validate::kv::DeletedDataTypes;
use subval_validate::{
    CancellationFlag, KeyErrorKind, KeyIntegrityValidator, KeyTuple, KeyValidationResult,
    StopReason, ValidateError,
};

fn validate(fixture: &Fixture, new: &str, existing: Option<&str>) -> KeyValidationResult {
    KeyIntegrityValidator::default()
        .validate(&fixture.key_input(new, existing), &CancellationFlag::new())
        .expect("validate")
}

fn key(value: &str) -> KeyTuple {
    KeyTuple::new([value])
}

fn kinds(result: &KeyValidationResult, file_type: FileType) -> Vec<(u64, KeyErrorKind, String)> {
    result
        .errors_for(file_type)
        .map(|errors| {
            errors
                .errors
                .iter()
                .map(|error| (error.line, error.kind, error.keys.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

// --- uniqueness ---

#[test]
fn duplicate_donor_reports_unique_new_and_keeps_one_key() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale", "D1\tfemale"]);

    let result = validate(&fixture, "new", None);

    assert_eq!(
        kinds(&result, FileType::Donor),
        vec![(3, KeyErrorKind::UniqueNew, "D1".to_string())]
    );
    let digest = &result.new_digests[&FileType::Donor];
    assert_eq!(digest.len(), 1);
    assert!(digest.contains(&key("D1")));
}

#[test]
fn key_already_accepted_reports_unique_original() {
    let fixture = Fixture::new();
    fixture.write("accepted", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale", "D2\tfemale"]);

    let result = validate(&fixture, "new", Some("accepted"));

    assert_eq!(
        kinds(&result, FileType::Donor),
        vec![(2, KeyErrorKind::UniqueOriginal, "D1".to_string())]
    );
    assert_eq!(result.new_digests[&FileType::Donor].len(), 1);
    assert_eq!(result.existing_digests[&FileType::Donor].len(), 1);
}

// --- relations ---

#[test]
fn unresolved_donor_reports_relation_and_skips_specimen_key() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write(
        "new",
        "specimen.txt",
        SPECIMEN_HEADER,
        &["D9\tSP1\tnormal", "D1\tSP2\tnormal"],
    );

    let result = validate(&fixture, "new", None);

    assert_eq!(
        kinds(&result, FileType::Specimen),
        vec![(2, KeyErrorKind::Relation, "D9".to_string())]
    );
    let specimens = &result.new_digests[&FileType::Specimen];
    assert!(!specimens.contains(&key("SP1")));
    assert!(specimens.contains(&key("SP2")));
    assert!(result.errors_for(FileType::Donor).is_none());
}

#[test]
fn relation_resolves_against_accepted_data() {
    let fixture = Fixture::new();
    fixture.write("accepted", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["D1\tSP1\tnormal"]);

    let result = validate(&fixture, "new", Some("accepted"));

    assert!(!result.has_errors(), "{:?}", result.file_errors);
}

#[test]
fn secondary_relation_is_checked_only_when_filled_in() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["D1\tSP1\tnormal"]);
    fixture.write(
        "new",
        "sample.txt",
        SAMPLE_HEADER,
        &["SA1\tSP1\tdna", "SA2\tSP1\tdna"],
    );
    fixture.write(
        "new",
        "ssm_m.txt",
        SSM_M_HEADER,
        &[
            "AN1\tSA1\tSA2\tillumina",
            "AN2\tSA1\tSAX\tillumina",
            "AN3\tSA2\t-777\tillumina",
        ],
    );
    fixture.write(
        "new",
        "ssm_p.txt",
        SSM_P_HEADER,
        &[
            "AN1\tSA1\tsnv\tA\tA/A\tA/G\tA\tG",
            "AN3\tSA2\tsnv\tA\tA/A\tA/G\tA\tG",
        ],
    );

    let result = validate(&fixture, "new", None);

    assert_eq!(
        kinds(&result, FileType::SsmM),
        vec![(3, KeyErrorKind::SecondaryRelation, "SAX".to_string())]
    );
    assert_eq!(result.file_errors.len(), 1, "{:?}", result.file_errors);
    let meta = &result.new_digests[&FileType::SsmM];
    assert!(meta.contains(&KeyTuple::new(["AN3", "SA2"])));
    assert!(!meta.contains(&KeyTuple::new(["AN2", "SA1"])));
}

#[test]
fn short_row_is_structurally_invalid() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write(
        "new",
        "specimen.txt",
        SPECIMEN_HEADER,
        &["D1", "D1\tSP1\tnormal"],
    );

    let result = validate(&fixture, "new", None);

    assert_eq!(
        kinds(&result, FileType::Specimen),
        vec![(2, KeyErrorKind::StructurallyInvalidRow, "1".to_string())]
    );
}

// --- surjection ---

#[test]
fn unused_donor_reports_exactly_one_surjection_error() {
    let fixture = Fixture::new();
    fixture.write(
        "new",
        "donor.txt",
        DONOR_HEADER,
        &["A\tmale", "B\tmale", "C\tfemale"],
    );
    fixture.write(
        "new",
        "specimen.txt",
        SPECIMEN_HEADER,
        &["A\tSP1\tnormal", "B\tSP2\tnormal"],
    );

    let result = validate(&fixture, "new", None);

    assert_eq!(
        kinds(&result, FileType::Donor),
        vec![(0, KeyErrorKind::Surjection, "C".to_string())]
    );
    let errors = result.errors_for(FileType::Donor).expect("donor errors");
    assert_eq!(errors.file_name, "donor.txt");
    assert_eq!(errors.errors[0].related, Some(FileType::Specimen));
    assert_eq!(result.error_count(), 1);
}

#[test]
fn sample_unused_by_every_meta_file_reports_complex_surjection() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["D1\tSP1\tnormal"]);
    fixture.write(
        "new",
        "sample.txt",
        SAMPLE_HEADER,
        &["SA1\tSP1\tdna", "SA2\tSP1\tdna", "SA3\tSP1\tdna"],
    );
    fixture.write("new", "ssm_m.txt", SSM_M_HEADER, &["AN1\tSA1\tSA2\tillumina"]);
    fixture.write(
        "new",
        "ssm_p.txt",
        SSM_P_HEADER,
        &["AN1\tSA1\tsnv\tA\tA/A\tA/G\tA\tG"],
    );

    let result = validate(&fixture, "new", None);

    assert_eq!(
        kinds(&result, FileType::Sample),
        vec![(0, KeyErrorKind::Surjection, "SA3".to_string())]
    );
    let errors = result.errors_for(FileType::Sample).expect("sample errors");
    assert_eq!(errors.errors[0].related, None);
    assert_eq!(result.error_count(), 1);
}

#[test]
fn complex_surjection_is_skipped_without_meta_files() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["D1\tSP1\tnormal"]);
    fixture.write("new", "sample.txt", SAMPLE_HEADER, &["SA1\tSP1\tdna"]);

    let result = validate(&fixture, "new", None);

    assert!(!result.has_errors(), "{:?}", result.file_errors);
}

#[test]
fn surjection_errors_become_file_level_report_errors() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["A\tmale", "B\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["A\tSP1\tnormal"]);

    let errors = validate(&fixture, "new", None).into_report_errors();

    assert_eq!(errors.len(), 1);
    let error = &errors[0];
    assert_eq!(error.error_type, ErrorType::Surjection);
    assert_eq!(error.line_number, 0);
    assert_eq!(error.file_name, "donor.txt");
    assert_eq!(error.field_names, vec!["donor_id".to_string()]);
    assert_eq!(error.value, "B");
    assert_eq!(
        error.parameters.get("referencingFileType").map(String::as_str),
        Some("specimen")
    );
}

// --- deletions ---

#[test]
fn deleted_donors_are_exempt_from_uniqueness_and_surjection() {
    let fixture = Fixture::new();
    fixture.write("accepted", "donor.txt", DONOR_HEADER, &["D1\tmale", "D2\tmale"]);
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["D2\tSP1\tnormal"]);

    let without = validate(&fixture, "new", Some("accepted"));
    assert_eq!(
        kinds(&without, FileType::Donor),
        vec![
            (2, KeyErrorKind::UniqueOriginal, "D1".to_string()),
            (0, KeyErrorKind::Surjection, "D1".to_string()),
        ]
    );

    let mut input = fixture.key_input("new", Some("accepted"));
    input.deletions.insert("D1", DeletedDataTypes::All);
    let with = KeyIntegrityValidator::default()
        .validate(&input, &CancellationFlag::new())
        .expect("validate");
    assert!(!with.has_errors(), "{:?}", with.file_errors);
}

#[test]
fn donor_deleted_for_feature_data_only_is_still_exempt() {
    let fixture = Fixture::new();
    fixture.write("accepted", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "specimen.txt", SPECIMEN_HEADER, &["D1\tSP1\tnormal"]);

    let mut input = fixture.key_input("new", Some("accepted"));
    input
        .deletions
        .insert("D1", DeletedDataTypes::Listed([subval_model::DataType::Ssm].into()));
    let result = KeyIntegrityValidator::default()
        .validate(&input, &CancellationFlag::new())
        .expect("validate");

    assert_eq!(kinds(&result, FileType::Donor), vec![]);
    assert_eq!(kinds(&result, FileType::Specimen), vec![]);
}

#[test]
fn deleting_unknown_donor_is_reported() {
    let fixture = Fixture::new();
    fixture.write("accepted", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D2\tmale"]);

    let mut input = fixture.key_input("new", Some("accepted"));
    input
        .deletions
        .insert("D7", DeletedDataTypes::Listed([subval_model::DataType::Ssm].into()));
    let result = KeyIntegrityValidator::default()
        .validate(&input, &CancellationFlag::new())
        .expect("validate");

    assert_eq!(result.deletion_errors.len(), 1);
    assert_eq!(result.deletion_errors[0].error_type, ErrorType::UnknownDeletedDonor);
    assert_eq!(result.deletion_errors[0].value, "D7");
}

// --- cancellation ---

#[test]
fn stop_request_ends_validation() {
    let fixture = Fixture::new();
    fixture.write("new", "donor.txt", DONOR_HEADER, &["D1\tmale"]);
    let cancel = CancellationFlag::new();
    cancel.cancel();
    cancel.abort();

    let err = KeyIntegrityValidator::default()
        .validate(&fixture.key_input("new", None), &cancel)
        .expect_err("stopped");

    assert!(matches!(err, ValidateError::Stopped(StopReason::Cancelled)));
}

// --- digest law ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_accepted_key_is_in_the_digest(
        donors in prop::collection::btree_set("[A-Z][0-9]{1,4}", 1..30),
        duplicated in prop::collection::vec(any::<prop::sample::Index>(), 0..5),
    ) {
        let donors: Vec<String> = donors.into_iter().collect();
        let mut rows: Vec<String> = donors.iter().map(|donor| format!("{donor}\tmale")).collect();
        for index in &duplicated {
            rows.push(format!("{}\tfemale", index.get(&donors)));
        }
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let fixture = Fixture::new();
        fixture.write("new", "donor.txt", DONOR_HEADER, &rows);

        let result = validate(&fixture, "new", None);

        let digest = &result.new_digests[&FileType::Donor];
        prop_assert_eq!(digest.len(), donors.len());
        for donor in &donors {
            prop_assert!(digest.contains(&key(donor)));
        }
        prop_assert_eq!(result.error_count(), duplicated.len());
    }
}
