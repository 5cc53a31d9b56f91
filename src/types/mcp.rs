//! MCP (Model Context Protocol) server configuration
//!
//! These types only describe server configurations forwarded to the CLI via
//! `--mcp-config`. The SDK does not host MCP servers in-process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// MCP server spawned as a subprocess over stdio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpStdioServerConfig {
    /// Server type, `"stdio"` when present
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub server_type: Option<String>,
    /// Command to execute
    pub command: String,
    /// Command arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

/// MCP server reached over Server-Sent Events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSseServerConfig {
    /// Server type, `"sse"`
    #[serde(rename = "type")]
    pub server_type: String,
    /// Server URL
    pub url: String,
    /// HTTP headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// MCP server reached over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpHttpServerConfig {
    /// Server type, `"http"`
    #[serde(rename = "type")]
    pub server_type: String,
    /// Server URL
    pub url: String,
    /// HTTP headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// One configured MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    /// Stdio subprocess server
    Stdio(McpStdioServerConfig),
    /// SSE server
    Sse(McpSseServerConfig),
    /// HTTP server
    Http(McpHttpServerConfig),
    /// Raw configuration forwarded verbatim, minus any `instance` key
    Raw(serde_json::Value),
}

/// How MCP servers are supplied to the CLI
#[derive(Debug, Clone, Default)]
pub enum McpServers {
    /// No MCP servers
    #[default]
    None,
    /// Inline map of server configurations
    Dict(HashMap<String, McpServerConfig>),
    /// Pre-serialized JSON configuration
    Json(String),
    /// Path to a configuration file
    Path(PathBuf),
}
