use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::open_move_database,
    error::{MongoDaoError, MongoResult},
    models::MongoMoveDocument,
};
use crate::dao::{models::MoveEntity, move_log::MoveLog, storage::StorageResult};

const MOVE_COLLECTION_NAME: &str = "moves";

#[derive(Clone)]
pub struct MongoMoveLog {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle it produced.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_move_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMoveLog {
    /// Establish a connection to MongoDB and ensure the moves collection is indexed.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_move_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Index creation is idempotent, so this doubles as create-if-absent for the collection.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        let by_time = mongodb::IndexModel::builder()
            .keys(doc! {"created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("move_created_at_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(by_time)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MOVE_COLLECTION_NAME,
                index: "created_at",
                source,
            })?;

        let by_participant = mongodb::IndexModel::builder()
            .keys(doc! {"participant_id": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("move_participant_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(by_participant)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MOVE_COLLECTION_NAME,
                index: "participant_id,created_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoMoveDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMoveDocument>(MOVE_COLLECTION_NAME)
    }

    async fn append(&self, entry: MoveEntity) -> MongoResult<()> {
        let id = entry.id;
        let document = MongoMoveDocument::try_from(entry)?;
        let collection = self.collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendMove { id, source })?;
        Ok(())
    }
}

impl MoveLog for MongoMoveLog {
    fn append(&self, entry: MoveEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append(entry).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
