//! Validation of submitted files.
//!
//! - [`kv`]: primary/foreign key and surjection checks
//! - [`structure`]: file presence and header checks
//! - [`normalize`]: SSM observation normalization
//! - [`pipeline`]: chains the stages into one report

pub mod cancel;
pub mod error;
pub mod kv;
pub mod normalize;
pub mod pipeline;
pub mod structure;
pub mod summary;

pub use cancel::{CancellationFlag, StopReason};
pub use error::{Result, ValidateError};
pub use kv::{
    DeletionManifest, FileKeyErrors, KeyDigest, KeyErrorKind, KeyIntegrityValidator, KeyTuple,
    KeyValidationInput, KeyValidationResult, key_spec,
};
pub use normalize::{NormalizationConfig, NormalizationOutcome, NormalizationReport, normalize_file};
pub use pipeline::{PipelineConfig, PipelineOutcome, ValidationPipeline, ValidationRequest};
pub use structure::{
    StructuralValidationFailure, ValidationPlan, effective_data_types, plan_validation,
};
pub use summary::summarize_fields;
