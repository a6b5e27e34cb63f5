/// Caching layer
///
/// Only author profiles are cached; post documents are always read fresh so
/// mutations see the latest version.
pub mod profile_cache;

pub use profile_cache::CachedProfileLookup;
