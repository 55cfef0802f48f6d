use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid value for {column}: {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Filter type '{0}' is not allowed here")]
    UnsupportedFilterType(String),

    #[error("Update requires at least one item")]
    EmptyUpdate,

    #[error("Update requires at least one non-empty exact filter")]
    MissingUpdateFilter,
}
