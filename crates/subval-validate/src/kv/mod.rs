//! Key integrity validation.

pub mod deletion;
pub mod dictionary;
pub mod digest;
pub mod errors;
pub mod keys;
pub mod surjection;
pub mod validator;

pub use deletion::{DELETION_FILE_NAME, DeletedDataTypes, DeletionManifest};
pub use dictionary::{
    KeyFields, KeySpec, MISSING_CODES, Relation, Surjection, is_missing_value, is_required,
    key_spec,
};
pub use digest::{KeyDigest, build_existing_digest};
pub use errors::{FileKeyErrors, KeyError, KeyErrorKind};
pub use keys::{KeyTuple, RowKeys, RowTooShort, extract_row_keys};
pub use surjection::missing_keys;
pub use validator::{KeyIntegrityValidator, KeyValidationInput, KeyValidationResult};
