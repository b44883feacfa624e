//! Failures raised by the CouchDB move log.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for CouchDB move log calls.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Which CouchDB call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouchCall {
    /// `GET /{db}` while checking the move log database.
    LookupDatabase,
    /// `PUT /{db}` while creating the move log database.
    CreateDatabase,
    /// `PUT /{db}/{id}` for one move document.
    WriteMove,
    /// `GET /_up` health probe.
    Up,
}

impl std::fmt::Display for CouchCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LookupDatabase => "database lookup",
            Self::CreateDatabase => "database creation",
            Self::WriteMove => "move write",
            Self::Up => "health probe",
        })
    }
}

/// Failures that can occur while writing the move log to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// The move log backend lacks a required setting.
    #[error("CouchDB move log is not configured: `{var}` is unset")]
    NotConfigured { var: &'static str },
    /// The HTTP client could not be built.
    #[error("failed to build the CouchDB HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// The request never produced a response.
    #[error("CouchDB {call} for `{target}` could not be sent")]
    Transport {
        call: CouchCall,
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a status the move log cannot accept.
    #[error("CouchDB {call} for `{target}` answered {status}")]
    Rejected {
        call: CouchCall,
        target: String,
        status: StatusCode,
    },
}
