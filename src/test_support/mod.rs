//! Shared helpers for unit tests: a scripted transport and in-memory storage.
#![allow(clippy::unwrap_used)]

pub mod memory_storage;
pub mod mock_transport;
pub mod socket_guard;
