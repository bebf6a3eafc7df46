//! Infrastructure layer: wire formats, the desktop timer link and repositories.

pub mod desktop;
pub mod dto;
pub mod repository;
