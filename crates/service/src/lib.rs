//! Water quality prediction service
//!
//! HTTP front end over the `aqua-lib` engine, shared by the binary and the
//! integration tests.

pub mod api;
pub mod config;
