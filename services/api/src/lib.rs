//! Chiron API Library Crate
//!
//! This library contains the HTTP surface of the lesson service: configuration,
//! application state, request handlers, routing, and a mock downstream executor
//! for local runs. The binaries in `bin/` are thin wrappers around it.

pub mod config;
pub mod handlers;
pub mod mock_executor;
pub mod models;
pub mod router;
pub mod state;
