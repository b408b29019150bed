//! Collection schema management.
//!
//! Creates the multi-vector collection exactly once per name and reports
//! where a collection is in its lifecycle.

use lateness_models::{CollectionSchema, CollectionState};
use lateness_store::VectorStore;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// What [`SchemaManager::create_collection`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExisted,
    Recreated,
}

/// Manages collections on a borrowed store handle.
pub struct SchemaManager<'a> {
    store: &'a dyn VectorStore,
    strict: bool,
}

impl<'a> SchemaManager<'a> {
    pub fn new(store: &'a dyn VectorStore) -> Self {
        Self {
            store,
            strict: false,
        }
    }

    /// In strict mode an existing collection is an error rather than a no-op.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Ensure a collection with this schema exists.
    ///
    /// With `recreate` an existing collection is dropped first, discarding
    /// its points.
    pub async fn create_collection(
        &self,
        schema: &CollectionSchema,
        recreate: bool,
    ) -> Result<CreateOutcome> {
        validate_schema(schema)?;

        if self.store.collection_exists(&schema.name).await? {
            if recreate {
                self.store.delete_collection(&schema.name).await?;
                self.store.create_collection(schema).await?;
                info!(collection = %schema.name, "Recreated collection");
                return Ok(CreateOutcome::Recreated);
            }
            if self.strict {
                return Err(Error::CollectionExists(schema.name.clone()));
            }
            self.warn_on_drift(schema).await?;
            debug!(collection = %schema.name, "Collection already exists");
            return Ok(CreateOutcome::AlreadyExisted);
        }

        match self.store.create_collection(schema).await {
            Ok(()) => {
                info!(
                    collection = %schema.name,
                    dimension = schema.vector_dim,
                    distance = %schema.distance,
                    "Created collection"
                );
                Ok(CreateOutcome::Created)
            }
            // Lost a creation race with another writer.
            Err(lateness_store::Error::CollectionExists(_)) if !self.strict => {
                Ok(CreateOutcome::AlreadyExisted)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a collection and all its points. No-op when absent.
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        self.store.delete_collection(name).await?;
        info!(collection = %name, "Dropped collection");
        Ok(())
    }

    pub async fn state(&self, name: &str) -> Result<CollectionState> {
        let info = self.store.collection_info(name).await?;
        Ok(if !info.exists {
            CollectionState::NotCreated
        } else if info.points_count == 0 {
            CollectionState::Created
        } else if !info.ready {
            CollectionState::Populated
        } else {
            CollectionState::Searchable
        })
    }

    async fn warn_on_drift(&self, schema: &CollectionSchema) -> Result<()> {
        let info = self.store.collection_info(&schema.name).await?;
        if let Some(existing) = info.schema {
            if existing.vector_dim != schema.vector_dim || existing.distance != schema.distance {
                warn!(
                    collection = %schema.name,
                    existing_dim = existing.vector_dim,
                    requested_dim = schema.vector_dim,
                    existing_distance = %existing.distance,
                    requested_distance = %schema.distance,
                    "Existing collection differs from requested schema"
                );
            }
        }
        Ok(())
    }
}

fn validate_schema(schema: &CollectionSchema) -> Result<()> {
    if schema.name.trim().is_empty() {
        return Err(Error::InvalidInput("collection name must not be empty".into()));
    }
    if schema.vector_dim == 0 {
        return Err(Error::InvalidInput("vector_dim must be greater than 0".into()));
    }
    if !schema.multi_vector {
        return Err(Error::InvalidInput(
            "late-interaction collections must store multi-vectors".into(),
        ));
    }
    Ok(())
}
