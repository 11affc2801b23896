/// Database layer
///
/// - `pool`: connection pool construction and health checks
/// - `migrations`: embedded schema migrations
///
/// Table-level queries live next to their types in `models`.

pub mod migrations;
pub mod pool;
