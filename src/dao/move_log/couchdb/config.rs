use super::error::{CouchDaoError, CouchResult};

/// Database used when `COUCH_DB` is not set.
pub const DEFAULT_DATABASE: &str = "crowdplay";

/// Basic-auth pair sent with every move log request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchCredentials {
    /// CouchDB user name.
    pub username: String,
    /// CouchDB password.
    pub password: String,
}

/// Where the move log documents live in CouchDB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    /// Server root, without a trailing slash.
    pub base_url: String,
    /// Database holding one document per applied move.
    pub database: String,
    /// Present only when both user name and password are configured.
    pub credentials: Option<CouchCredentials>,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB`, `COUCH_USERNAME` and `COUCH_PASSWORD`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let base_url = lookup("COUCH_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty())
            .ok_or(CouchDaoError::NotConfigured {
                var: "COUCH_BASE_URL",
            })?;
        let database = lookup("COUCH_DB")
            .map(|db| db.trim().to_owned())
            .filter(|db| !db.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let credentials = lookup("COUCH_USERNAME")
            .zip(lookup("COUCH_PASSWORD"))
            .map(|(username, password)| CouchCredentials { username, password });

        Ok(Self {
            base_url,
            database,
            credentials,
        })
    }
}
