/// Middleware for the API server
///
/// - `identity`: resolves the caller before any protected handler runs
/// - `security`: security response headers

pub mod identity;
pub mod security;
