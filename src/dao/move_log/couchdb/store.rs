use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};

use crate::dao::{models::MoveEntity, move_log::MoveLog, storage::StorageResult};

use super::{
    config::CouchConfig,
    error::{CouchCall, CouchDaoError, CouchResult},
    models::CouchMoveDocument,
};

#[derive(Clone)]
pub struct CouchMoveLog {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchMoveLog {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::Client { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|c| (Arc::<str>::from(c.username), Arc::<str>::from(c.password))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    async fn send(
        &self,
        call: CouchCall,
        target: &str,
        builder: reqwest::RequestBuilder,
    ) -> CouchResult<StatusCode> {
        builder
            .send()
            .await
            .map(|response| response.status())
            .map_err(|source| CouchDaoError::Transport {
                call,
                target: target.to_owned(),
                source,
            })
    }

    fn rejected(call: CouchCall, target: &str, status: StatusCode) -> CouchDaoError {
        CouchDaoError::Rejected {
            call,
            target: target.to_owned(),
            status,
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let url = format!("{}/{}", self.base_url, self.database);
        let database = self.database.as_ref();

        let status = self
            .send(
                CouchCall::LookupDatabase,
                database,
                self.request(Method::GET, &url),
            )
            .await?;
        if status == StatusCode::OK {
            return Ok(());
        }
        if status != StatusCode::NOT_FOUND {
            return Err(Self::rejected(CouchCall::LookupDatabase, database, status));
        }

        let status = self
            .send(
                CouchCall::CreateDatabase,
                database,
                self.request(Method::PUT, &url),
            )
            .await?;
        // 412: another instance created it between our GET and PUT.
        if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
            Ok(())
        } else {
            Err(Self::rejected(CouchCall::CreateDatabase, database, status))
        }
    }

    async fn append(&self, entry: MoveEntity) -> CouchResult<()> {
        let document = CouchMoveDocument::from(entry);
        let url = format!("{}/{}/{}", self.base_url, self.database, document.id);
        let status = self
            .send(
                CouchCall::WriteMove,
                &document.id,
                self.request(Method::PUT, &url).json(&document),
            )
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::rejected(CouchCall::WriteMove, &document.id, status))
        }
    }

    async fn ping(&self) -> CouchResult<()> {
        let url = format!("{}/_up", self.base_url);
        let status = self
            .send(CouchCall::Up, &url, self.request(Method::GET, &url))
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::rejected(CouchCall::Up, &url, status))
        }
    }
}

impl MoveLog for CouchMoveLog {
    fn append(&self, entry: MoveEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append(entry).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        // HTTP is stateless: reconnecting means the database is reachable and present.
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
