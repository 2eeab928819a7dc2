//! Test modules for relay-mcp-server
//!
//! Suites that exercise several components together; unit tests live beside
//! the code they cover.

pub mod support;
