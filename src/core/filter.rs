//! Filter expressions for the backend `/query` endpoint.
//!
//! Grammar: `field=="literal"` and `field>"literal"` clauses, `;` for AND,
//! `(a,b)` for OR. Literals are always double-quoted and cannot contain a
//! double quote or a semicolon, since the backend offers no escape.

use std::fmt;

use chrono::{DateTime, Utc};

use super::models::format_timestamp;
use crate::error::{Error, Result};

pub const FIELD_RESULT: &str = "result";
pub const FIELD_CREATION_TIME: &str = "creationtime";
pub const FIELD_JOB_NAME: &str = "jobname";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { field: &'static str, value: String },
    After { field: &'static str, value: String },
    All(Vec<Filter>),
    Any(Vec<Filter>),
}

/// Validate a literal for use inside double quotes.
pub fn literal(field: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{field} must not be empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| *c == '"' || *c == ';' || c.is_control())
    {
        return Err(Error::InvalidInput(format!(
            "{field} {value:?} contains {c:?}, which the query filter cannot express"
        )));
    }
    Ok(value.to_string())
}

impl Filter {
    pub fn eq(field: &'static str, value: &str) -> Result<Self> {
        Ok(Self::Eq {
            field,
            value: literal(field, value)?,
        })
    }

    /// `creationtime>"<ts>"`
    pub fn created_after(ts: &DateTime<Utc>) -> Self {
        Self::After {
            field: FIELD_CREATION_TIME,
            value: format_timestamp(ts),
        }
    }

    pub fn result_is(result: &str) -> Result<Self> {
        Self::eq(FIELD_RESULT, result)
    }

    /// `result=="Failed";creationtime>"<since>"`
    pub fn failed_since(since: &DateTime<Utc>) -> Result<Self> {
        Ok(Self::All(vec![
            Self::result_is("Failed")?,
            Self::created_after(since),
        ]))
    }

    /// `jobname=="<name>";(result=="Success",result=="Warning");creationtime>"<since>"`
    pub fn succeeded_since(job_name: &str, since: &DateTime<Utc>) -> Result<Self> {
        Ok(Self::All(vec![
            Self::eq(FIELD_JOB_NAME, job_name)?,
            Self::Any(vec![Self::result_is("Success")?, Self::result_is("Warning")?]),
            Self::created_after(since),
        ]))
    }
}

fn join(f: &mut fmt::Formatter<'_>, parts: &[Filter], sep: &str) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{part}")?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq { field, value } => write!(f, "{field}==\"{value}\""),
            Self::After { field, value } => write!(f, "{field}>\"{value}\""),
            Self::All(parts) => join(f, parts, ";"),
            Self::Any(parts) => {
                f.write_str("(")?;
                join(f, parts, ",")?;
                f.write_str(")")
            }
        }
    }
}
