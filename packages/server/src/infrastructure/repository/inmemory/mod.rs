//! In-memory repositories.

mod connection;

pub use connection::{DEFAULT_CONNECTION_CAPACITY, InMemoryConnectionRepository};
