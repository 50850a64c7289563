//! Host services: in-memory implementations of the host-side ports.

pub mod entity_host;
