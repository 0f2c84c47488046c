//! In-memory collaborators
//!
//! Stand-ins for the storage engine, discovery layer, and remote cache
//! service. They are deterministic and scriptable, which makes them the
//! backbone of the test-suite and of the `distobj demo` command.

mod memory_cache;
mod memory_engine;
mod static_discovery;

pub use memory_cache::{MemoryCacheProxy, SaveResponse};
pub use memory_engine::{MemoryEngine, SyncBehavior, ERR_KEY_NOT_FOUND, ERR_TABLE_EXISTS, ERR_TABLE_NOT_FOUND};
pub use static_discovery::StaticDiscovery;
