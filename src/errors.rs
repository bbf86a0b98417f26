//! Error Types
//!
//! One error enum covers the failure modes of building engine state from
//! parsed asset records. Frame evaluation itself never fails: malformed
//! data encountered on the hot path is dropped or clamped locally and
//! reported through `log` (see the skinning and curve modules).

use thiserror::Error;

/// The main error type for the sinew engine.
#[derive(Error, Debug)]
pub enum SinewError {
    /// A record is missing a field required to build engine state.
    #[error("record `{record}` is missing required field `{field}`")]
    MissingField {
        /// Kind of the record being read
        record: String,
        /// Name of the absent field
        field: String,
    },

    /// A field exists but holds a value of the wrong type.
    #[error("record `{record}` field `{field}` has an unexpected type")]
    FieldType {
        /// Kind of the record being read
        record: String,
        /// Name of the offending field
        field: String,
    },

    /// A record kind the engine does not know how to interpret.
    #[error("unsupported data record kind `{0}`")]
    UnknownKind(String),

    /// A channel or buffer is too short for the layout it declares.
    #[error("record `{record}`: {context} (needs {needed}, found {found})")]
    ShortBuffer {
        /// Kind of the record being read
        record: String,
        /// What was being sliced
        context: String,
        /// Required element count
        needed: usize,
        /// Actual element count
        found: usize,
    },
}

/// Alias for `Result<T, SinewError>`.
pub type Result<T> = std::result::Result<T, SinewError>;
