//! Error taxonomy for result materialization runs.
//!
//! Every failure aborts the current run; nothing is retried. The category of
//! an error decides the process exit code reported by the CLI.

use std::fmt;
use thiserror::Error;

/// Result type used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Source unreachable or misconfigured.
    Connection,
    /// Query failed to prepare, execute or produce rows.
    Query,
    /// A batch or value disagreed with the stream schema.
    Schema,
    /// Releasing a scoped resource failed.
    Release,
    /// Invalid configuration or strategy selection.
    Configuration,
    /// The report could not be written.
    Output,
}

impl ErrorCategory {
    /// Process exit code for errors of this category. Never zero.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Connection => 2,
            Self::Query => 3,
            Self::Schema => 4,
            Self::Release => 5,
            Self::Configuration => 64,
            Self::Output => 74,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Schema => write!(f, "schema"),
            Self::Release => write!(f, "release"),
            Self::Configuration => write!(f, "configuration"),
            Self::Output => write!(f, "output"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The data source could not be opened.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The query could not be prepared, executed or read.
    #[error("query execution error: {message}")]
    QueryExecution {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A batch or value did not match the schema fixed by the stream.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// Releasing a statement, cursor or connection failed.
    #[error("failed to release {resource}: {message}")]
    ResourceRelease {
        resource: &'static str,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Invalid configuration value or strategy selection.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The benchmark report could not be written out.
    #[error("cannot write report: {source}")]
    ReportOutput {
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::QueryExecution { .. } => ErrorCategory::Query,
            Self::SchemaMismatch { .. } => ErrorCategory::Schema,
            Self::ResourceRelease { .. } => ErrorCategory::Release,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::ReportOutput { .. } => ErrorCategory::Output,
        }
    }

    /// Shorthand for `self.category().exit_code()`.
    #[inline]
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Query error carrying the offending SQL text and the driver error.
    pub fn query_with_sql(
        message: impl Into<String>,
        sql: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::QueryExecution {
            message: message.into(),
            sql: Some(sql.into()),
            source: Some(Box::new(source)),
        }
    }

    pub fn query_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::QueryExecution {
            message: message.into(),
            sql: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    pub fn release(
        resource: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ResourceRelease {
            resource,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn output(source: std::io::Error) -> Self {
        Self::ReportOutput { source }
    }

    /// SQL text attached to a query error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let categories = [
            ErrorCategory::Connection,
            ErrorCategory::Query,
            ErrorCategory::Schema,
            ErrorCategory::Release,
            ErrorCategory::Configuration,
            ErrorCategory::Output,
        ];
        for (i, a) in categories.iter().enumerate() {
            assert_ne!(a.exit_code(), 0);
            for b in &categories[i + 1..] {
                assert_ne!(a.exit_code(), b.exit_code(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn constructors_map_to_categories() {
        assert_eq!(
            Error::connection("refused").category(),
            ErrorCategory::Connection
        );
        assert_eq!(Error::query("syntax").category(), ErrorCategory::Query);
        assert_eq!(
            Error::schema_mismatch("column 3").category(),
            ErrorCategory::Schema
        );
        assert_eq!(Error::config("bad").category(), ErrorCategory::Configuration);
        let broken_pipe = io::Error::from(io::ErrorKind::BrokenPipe);
        assert_eq!(Error::output(broken_pipe).exit_code(), 74);
        let io_err = io::Error::other("busy");
        assert_eq!(
            Error::release("connection", io_err).category(),
            ErrorCategory::Release
        );
    }

    #[test]
    fn query_error_keeps_sql_and_source() {
        let err = Error::query_with_sql(
            "prepare failed",
            "SELECT * FORM lineitem",
            io::Error::other("near FORM: syntax error"),
        );
        assert_eq!(err.sql(), Some("SELECT * FORM lineitem"));
        assert!(err.to_string().contains("prepare failed"));
        assert!(err.source().unwrap().to_string().contains("syntax error"));
    }

    #[test]
    fn release_error_names_resource() {
        let err = Error::release("statement", io::Error::other("locked"));
        let text = err.to_string();
        assert!(text.contains("statement"));
        assert!(text.contains("locked"));
    }
}
