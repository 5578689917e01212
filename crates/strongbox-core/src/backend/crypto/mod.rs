//! Crypto backend implementations

mod age;
mod gpg;
mod mock;
mod plain;

pub use age::{Age, AgeLoader};
pub use gpg::{Gpg, GpgLoader};
pub use mock::{MockCrypto, MockLoader};
pub use plain::{Plain, PlainLoader};

use crate::error::{StoreError, StoreResult};

use super::Storage;

/// Shared `handles` check: the backend's marker file exists in the storage
fn marker_present(storage: &dyn Storage, id_file: &str) -> StoreResult<()> {
    if storage.exists(id_file) {
        Ok(())
    } else {
        Err(StoreError::BackendNotDetected(storage.path().join(id_file)))
    }
}
