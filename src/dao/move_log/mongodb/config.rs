use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Database used when `MONGO_DB` is not set.
pub const DEFAULT_DATABASE: &str = "crowdplay";
/// Reported to the server so move log connections are easy to spot.
const APP_NAME: &str = "crowdplay-back";

/// Parsed client options plus the database holding the `moves` collection.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from `MONGO_URI`.
    pub options: ClientOptions,
    /// Database holding the move log.
    pub database_name: String,
}

impl MongoConfig {
    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .ok()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(MongoDaoError::NotConfigured { var: "MONGO_URI" })?;
        let database = std::env::var("MONGO_DB").ok();
        Self::parse(uri.trim(), database.as_deref()).await
    }

    async fn parse(uri: &str, database: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());

        // An explicit MONGO_DB wins over the URI path, which wins over the default.
        let database_name = database
            .map(str::trim)
            .filter(|db| !db.is_empty())
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }
}
