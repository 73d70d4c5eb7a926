//! Schema acquisition: loading the static schema, caching registry schemas, and choosing the
//! schema for each message.

mod cache;
mod loader;
mod resolver;

pub use self::cache::SchemaCache;
pub use self::loader::{SchemaLoadError, load_schema};
pub use self::resolver::{ResolveError, SchemaResolver, SchemaSource};
