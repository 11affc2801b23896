/// Account-level workflows
///
/// - [`store`]: ownership-scoped reads and bulk deletes ([`AccountStore`])
/// - [`export`]: best-effort concurrent export of everything a user owns
/// - [`deletion`]: the ordered deletion cascade
/// - [`memory`]: in-memory store with foreign keys, a journal and failure
///   injection

pub mod deletion;
pub mod export;
pub mod memory;
pub mod store;

pub use deletion::{AccountDeleter, CascadePolicy, DeletionError, DeletionReport};
pub use export::{export_account, export_filename, AccountExport};
pub use store::{AccountStore, EntityKind, PgAccountStore, StoreError};
