use thiserror::Error;

pub type Result<T> = core::result::Result<T, LciCoreError>;

#[derive(Error, Debug)]
pub enum LciCoreError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Duplicate activity label: {0}")]
    DuplicateLabel(String),

    #[error("Duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("No activity label matches contains={contains:?}, excludes={excludes:?}")]
    NoMatchingLabel {
        contains: Vec<String>,
        excludes: Vec<String>,
    },

    #[error(
        "Expected exactly one activity label matching contains={contains:?}, \
         excludes={excludes:?}, found {found}"
    )]
    AmbiguousLabel {
        contains: Vec<String>,
        excludes: Vec<String>,
        found: usize,
    },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),
    // Add more specific errors as needed
}
