//! Read access to CarReport database snapshots.
//!
//! CarReport exports its SQLite database into a backup directory. The newest
//! export is located with [`latest_snapshot`] and loaded eagerly by
//! [`SnapshotStore`]; the file is never written.

mod error;
mod snapshot;
mod sqlite;

pub use error::StoreError;
pub use snapshot::latest_snapshot;
pub use sqlite::SnapshotStore;
