//! Data transfer objects for the wire protocol and the status API.

pub mod http;
pub mod wire;
