//! Tool and resource catalogs
//!
//! Provides the Raindrop.io bookmarking operations exposed over the MCP protocol

pub mod content;
pub mod diagnostics;
pub mod resources;
pub mod tools;
pub mod utils;
