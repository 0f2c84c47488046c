//! Handle to one distributed object

use super::errors::{ObjectError, ObjectResult};
use super::traits::StorageEngine;
use super::types::ObjectData;
use super::value::ObjectValue;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// A live distributed object, identified by its session id
///
/// Handles are created and owned by [`ObjectStore`](super::store::ObjectStore);
/// callers receive shared references.
pub struct DistributedObject {
    session_id: String,
    engine: Arc<dyn StorageEngine>,
}

impl DistributedObject {
    pub(crate) fn new(session_id: impl Into<String>, engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            session_id: session_id.into(),
            engine,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn engine(&self) -> ObjectResult<&Arc<dyn StorageEngine>> {
        if self.engine.is_opened() {
            Ok(&self.engine)
        } else {
            error!(session_id = %self.session_id, "storage engine not open");
            Err(ObjectError::StoreNotOpen)
        }
    }

    /// Write raw bytes under `key`
    pub fn put(&self, key: &str, value: Vec<u8>) -> ObjectResult<()> {
        self.engine()?.update_item(&self.session_id, key, value)
    }

    /// Read raw bytes stored under `key`
    pub fn get(&self, key: &str) -> ObjectResult<Vec<u8>> {
        self.engine()?.get_item(&self.session_id, key)
    }

    pub fn put_value(&self, key: &str, value: impl Into<ObjectValue>) -> ObjectResult<()> {
        self.put(key, value.into().encode())
    }

    pub fn get_value(&self, key: &str) -> ObjectResult<ObjectValue> {
        ObjectValue::decode(&self.get(key)?)
    }

    /// Every item of this object
    pub fn items(&self) -> ObjectResult<ObjectData> {
        self.engine()?.get_items(&self.session_id)
    }
}

impl fmt::Debug for DistributedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedObject")
            .field("session_id", &self.session_id)
            .finish()
    }
}
