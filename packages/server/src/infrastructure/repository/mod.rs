//! Repository implementations
//!
//! Concrete implementations of the repository traits defined by the domain
//! layer. Use cases depend on the traits, not on these types.

pub mod inmemory;

pub use inmemory::InMemoryConnectionRepository;
