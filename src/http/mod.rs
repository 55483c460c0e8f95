//! HTTP Transport layer for the Model Context Protocol
//!
//! Provides the external API routing: the streamable `/mcp` endpoint, the legacy
//! `/sse` + `/messages` pair, OAuth helpers, and service metadata.

pub mod handlers;
pub mod oauth;
pub mod sse;
