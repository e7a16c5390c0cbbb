use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use chronicle_core::{JsonSerializer, TextSerializer};

use crate::database::ConnectionConfig;
use crate::error::StoreError;
use crate::record::format_timestamp;

/// An entity with its own identity that can be loaded and saved as a unit.
pub trait AggregateRoot: Serialize + DeserializeOwned {
    fn aggregate_id(&self) -> String;

    /// Partition key in storage; aggregates of different types may share
    /// ids without colliding.
    fn aggregate_type() -> &'static str
    where
        Self: Sized,
    {
        let path = std::any::type_name::<Self>();
        path.rsplit("::").next().unwrap_or(path)
    }
}

/// Key-based find/save for one aggregate type.
///
/// Deliberately minimal: no versioning, no change tracking. Each call runs
/// on its own scoped session, like the message log itself.
pub struct SqlDataContext<T: AggregateRoot, S: TextSerializer = JsonSerializer> {
    config: ConnectionConfig,
    serializer: Arc<S>,
    _aggregate: PhantomData<fn() -> T>,
}

impl<T: AggregateRoot> SqlDataContext<T, JsonSerializer> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_serializer(config, JsonSerializer)
    }
}

impl<T: AggregateRoot, S: TextSerializer> SqlDataContext<T, S> {
    pub fn with_serializer(config: ConnectionConfig, serializer: S) -> Self {
        Self {
            config,
            serializer: Arc::new(serializer),
            _aggregate: PhantomData,
        }
    }

    /// Load the aggregate with the given id, or `None` if it was never
    /// saved.
    #[instrument(skip(self))]
    pub fn find(&self, id: &str) -> Result<Option<T>, StoreError> {
        use rusqlite::OptionalExtension;

        let session = self.config.open()?;
        let payload: Option<String> = session
            .conn()
            .query_row(
                "SELECT payload FROM aggregates WHERE id = ?1 AND type = ?2",
                rusqlite::params![id, T::aggregate_type()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(text) => {
                let aggregate = self.serializer.deserialize::<T>(&text).map_err(|e| {
                    StoreError::Decode {
                        type_path: std::any::type_name::<T>(),
                        detail: e.to_string(),
                    }
                })?;
                Ok(Some(aggregate))
            }
            None => Ok(None),
        }
    }

    /// Save the aggregate, overwriting any previously saved state.
    #[instrument(skip(self, aggregate))]
    pub fn save(&self, aggregate: &T) -> Result<(), StoreError> {
        let payload = self.serializer.serialize(aggregate)?;
        let session = self.config.open()?;
        session.conn().execute(
            "INSERT INTO aggregates (id, type, payload, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id, type) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            rusqlite::params![
                aggregate.aggregate_id(),
                T::aggregate_type(),
                payload,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }
}
