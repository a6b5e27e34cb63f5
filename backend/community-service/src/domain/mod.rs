//! Pure domain logic: role canonicalization, thread navigation, reactions.

pub mod likes;
pub mod role;
pub mod thread;

pub use role::{canonicalize, CanonicalRole, Role};
pub use thread::{MissingNode, NewNode, OwnershipChain};
