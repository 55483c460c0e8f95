//! The central Model Context Protocol engine
//!
//! Provides the primary MCP JSON-RPC decoding, method execution routing, capabilities
//! negotiation (`initialize`), and tool/resource dispatch.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolRequest, CallToolRequestParams, Implementation, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListResourcesRequest, ListResourcesResult, ListToolsRequest, ListToolsResult,
    PingRequest, ReadResourceRequest, ReadResourceRequestParams, ReadResourceResult, Resource,
    ServerCapabilities, ServerCapabilitiesResources, ServerCapabilitiesTools, Tool,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::domain::{
    content::ToolResponse,
    diagnostics::Diagnostics,
    resources::{build_resource_templates, build_resources_list, read_resource},
    tools::{build_tools_list, ToolCall, ToolContext},
};
use crate::errors::AppError;
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    json_rpc_serialized, request_id_to_value, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use crate::raindrop::RaindropApi;

pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

const SERVER_DESCRIPTION: &str =
    "MCP server exposing Raindrop.io collections, bookmarks, tags, and highlights";

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub capabilities: ManifestCapabilities,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestCapabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
}

/// Tool and resource registry shared by every transport.
pub struct McpService {
    api: Arc<dyn RaindropApi>,
    diagnostics: Diagnostics,
}

impl McpService {
    pub fn new(api: Arc<dyn RaindropApi>, diagnostics: Diagnostics) -> Self {
        Self { api, diagnostics }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        build_tools_list()
    }

    pub fn list_resources(&self) -> Vec<Resource> {
        build_resources_list()
    }

    /// Unknown tools and invalid arguments are protocol errors. Failures while
    /// the tool runs come back as an `isError` result.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolResponse, AppError> {
        let call = ToolCall::parse(name, arguments)?;
        let tool = call.name();
        let ctx = ToolContext {
            api: self.api.as_ref(),
            diagnostics: &self.diagnostics,
        };

        match call.execute(ctx).await {
            Ok(response) => Ok(response),
            Err(err) => {
                warn!(tool, error = %err, "tool execution failed");
                Ok(ToolResponse::from_error(tool, &err))
            }
        }
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, AppError> {
        read_resource(self.api.as_ref(), &self.diagnostics, uri).await
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: SERVER_DESCRIPTION,
            capabilities: ManifestCapabilities {
                tools: true,
                resources: true,
                prompts: false,
            },
            tools: self.list_tools().into_iter().map(|tool| tool.name).collect(),
        }
    }

    pub fn health_check(&self) -> bool {
        true
    }

    /// Handles a single message or a batch. `None` means nothing to send back.
    pub async fn handle_payload(&self, payload: Value) -> Option<Value> {
        let Value::Array(batch) = payload else {
            return self.handle_json_rpc_value(payload).await;
        };

        if batch.is_empty() {
            return Some(Value::Array(vec![json_rpc_error(
                None,
                INVALID_REQUEST,
                "Invalid Request",
            )]));
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_json_rpc_value(item).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            None
        } else {
            Some(Value::Array(responses))
        }
    }

    pub async fn handle_json_rpc_value(&self, payload: Value) -> Option<Value> {
        if !payload.is_object() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let request_id = payload.get("id").cloned();
        let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
        };

        match parsed {
            JsonrpcMessage::Request(request) => {
                if let Err(error_response) = validate_request_shape(&request) {
                    return Some(error_response);
                }

                let request_id = request_id_to_value(request.id);
                if request.method.trim().is_empty() {
                    return Some(json_rpc_error(
                        Some(request_id),
                        INVALID_REQUEST,
                        "Invalid Request",
                    ));
                }

                Some(
                    self.handle_json_rpc_request(
                        Some(request_id),
                        request.method,
                        request.params.map(Value::Object),
                    )
                    .await,
                )
            }
            JsonrpcMessage::Notification(notification) => {
                info!(method = %notification.method, "mcp notification received");
                None
            }
            JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
                Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
            }
        }
    }

    pub async fn handle_json_rpc_request(
        &self,
        id: Option<Value>,
        method: String,
        params: Option<Value>,
    ) -> Value {
        let audit_params = redact_audit_params(params.as_ref());

        let response = match method.as_str() {
            "initialize" => {
                let initialize_result = InitializeResult {
                    server_info: Implementation {
                        name: env!("CARGO_PKG_NAME").to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        title: Some("Raindrop.io MCP Server".to_string()),
                        description: Some(SERVER_DESCRIPTION.to_string()),
                        icons: vec![],
                        website_url: None,
                    },
                    capabilities: ServerCapabilities {
                        tools: Some(ServerCapabilitiesTools {
                            list_changed: Some(false),
                        }),
                        resources: Some(ServerCapabilitiesResources {
                            subscribe: Some(false),
                            list_changed: Some(false),
                        }),
                        prompts: None,
                        ..Default::default()
                    },
                    protocol_version: negotiate_protocol_version(params.as_ref()).to_string(),
                    instructions: Some(
                        "Use bookmark_search to find bookmarks and resources/read on the returned mcp:// links for full details."
                            .to_string(),
                    ),
                    meta: None,
                };

                json_rpc_serialized(id, &initialize_result)
            }
            "ping" => json_rpc_result(id, json!({})),
            "tools/list" => json_rpc_serialized(
                id,
                &ListToolsResult {
                    meta: None,
                    next_cursor: None,
                    tools: self.list_tools(),
                },
            ),
            "tools/call" => self.handle_tools_call(id, params).await,
            "resources/list" => json_rpc_serialized(
                id,
                &ListResourcesResult {
                    meta: None,
                    next_cursor: None,
                    resources: self.list_resources(),
                },
            ),
            "resources/templates/list" => json_rpc_result(
                id,
                json!({ "resourceTemplates": build_resource_templates() }),
            ),
            "resources/read" => self.handle_resources_read(id, params).await,
            _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
        };

        info!(
            method = %method,
            params = %audit_params,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(raw_params) = params else {
            return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
        };

        let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
            Ok(value) => value,
            Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
        };

        match self.call_tool(&tool_call.name, tool_call.arguments).await {
            Ok(response) => json_rpc_serialized(id, &response),
            Err(err) => app_error_to_json_rpc(id, err),
        }
    }

    async fn handle_resources_read(&self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(raw_params) = params else {
            return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
        };

        let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
            Ok(value) => value,
            Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
        };

        match self.read_resource(&resource_read.uri).await {
            Ok(result) => json_rpc_serialized(id, &result),
            Err(err) => app_error_to_json_rpc(id, err),
        }
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let request_id = Some(request_id_to_value(request.id.clone()));
    let Ok(payload) = serde_json::to_value(request) else {
        return Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"));
    };

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"))
    }
}

/// Echoes a supported offered version; anything else gets the latest one,
/// leaving the client to decide whether it can continue.
pub fn negotiate_protocol_version(params: Option<&Value>) -> &'static str {
    let offered = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim);

    offered
        .and_then(|offered| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|supported| *supported == offered)
        })
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

pub fn is_initialize_request(payload: &Value) -> bool {
    let is_initialize =
        |value: &Value| value.get("method").and_then(Value::as_str) == Some("initialize");

    match payload {
        Value::Array(items) => items.iter().any(is_initialize),
        other => is_initialize(other),
    }
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "credentials" | "credential" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::testing::MockRaindrop;

    fn service() -> McpService {
        McpService::new(
            Arc::new(MockRaindrop::default()),
            Diagnostics::new("stdio", "production", false),
        )
    }

    fn failing_service() -> McpService {
        McpService::new(
            Arc::new(MockRaindrop::failing()),
            Diagnostics::new("stdio", "production", true),
        )
    }

    #[test]
    fn redacts_sensitive_fields_in_audit_params() {
        let params = json!({
            "name": "bookmark_search",
            "arguments": {
                "search": "rust",
                "access_token": "should-not-appear",
                "api_key": "should-not-appear",
                "nested": {
                    "client_secret": "should-not-appear"
                }
            }
        });

        let redacted = redact_audit_params(Some(&params));

        assert_eq!(redacted["name"], json!("bookmark_search"));
        assert_eq!(redacted["arguments"]["search"], json!("rust"));
        assert_eq!(redacted["arguments"]["access_token"], json!("[REDACTED]"));
        assert_eq!(redacted["arguments"]["api_key"], json!("[REDACTED]"));
        assert_eq!(
            redacted["arguments"]["nested"]["client_secret"],
            json!("[REDACTED]")
        );
    }

    #[test]
    fn negotiate_protocol_version_echoes_supported_version() {
        let params = json!({ "protocolVersion": "2024-11-05" });
        assert_eq!(negotiate_protocol_version(Some(&params)), "2024-11-05");
    }

    #[test]
    fn negotiate_protocol_version_falls_back_to_latest() {
        let params = json!({ "protocolVersion": "2099-01-01" });
        assert_eq!(
            negotiate_protocol_version(Some(&params)),
            LATEST_PROTOCOL_VERSION
        );
        assert_eq!(negotiate_protocol_version(None), LATEST_PROTOCOL_VERSION);
    }

    #[test]
    fn manifest_lists_every_tool() {
        let manifest = service().manifest();
        assert_eq!(manifest.name, env!("CARGO_PKG_NAME"));
        assert_eq!(manifest.tools.len(), service().list_tools().len());
        assert!(manifest.capabilities.tools);
    }

    #[test]
    fn detects_initialize_in_batches() {
        assert!(is_initialize_request(
            &json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })
        ));
        assert!(is_initialize_request(&json!([
            { "jsonrpc": "2.0", "method": "notifications/initialized" },
            { "jsonrpc": "2.0", "id": 1, "method": "initialize" }
        ])));
        assert!(!is_initialize_request(
            &json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" })
        ));
    }

    #[tokio::test]
    async fn initialize_without_protocol_version_succeeds() {
        let response = service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": { "clientInfo": { "name": "t", "version": "1" }, "capabilities": {} }
            }))
            .await
            .expect("response");

        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["result"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(response["result"]["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let response = service()
            .handle_payload(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn empty_batch_is_invalid_request() {
        let response = service()
            .handle_payload(json!([]))
            .await
            .expect("response");
        assert_eq!(response[0]["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn batch_returns_only_request_responses() {
        let response = service()
            .handle_payload(json!([
                { "jsonrpc": "2.0", "id": 1, "method": "ping" },
                { "jsonrpc": "2.0", "method": "notifications/initialized" },
                { "jsonrpc": "2.0", "id": 2, "method": "tools/list" }
            ]))
            .await
            .expect("response");

        let responses = response.as_array().expect("batch");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let response = service()
            .handle_payload(json!({ "jsonrpc": "2.0", "id": 1, "method": "prompts/list" }))
            .await
            .expect("response");
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_tool_is_protocol_error() {
        let response = service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": { "name": "does_not_exist", "arguments": {} }
            }))
            .await
            .expect("response");

        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(response["error"]["data"]["code"], "tool_not_found");
    }

    #[tokio::test]
    async fn invalid_tool_arguments_are_protocol_error() {
        let response = service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "tools/call",
                "params": { "name": "bookmark_list", "arguments": { "collection_id": 1, "limit": 0 } }
            }))
            .await
            .expect("response");

        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["data"]["code"], "invalid_limit");
    }

    #[tokio::test]
    async fn traversal_highlight_id_fails_before_any_upstream_call() {
        let error = failing_service()
            .call_tool(
                "highlight_manage",
                json!({ "operation": "delete", "id": "../collection/5" })
                    .as_object()
                    .cloned(),
            )
            .await
            .expect_err("rejected id");

        assert!(matches!(
            error,
            AppError::BadRequest {
                code: "invalid_id",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn upstream_failure_becomes_is_error_result() {
        let response = failing_service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 6,
                "method": "tools/call",
                "params": { "name": "collection_list", "arguments": {} }
            }))
            .await
            .expect("response");

        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert!(response["result"]["content"][0]["text"]
            .as_str()
            .expect("text")
            .contains("503"));
    }

    #[tokio::test]
    async fn diagnostics_tool_call_returns_resource_link() {
        let response = service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": { "name": "diagnostics", "arguments": {} }
            }))
            .await
            .expect("response");

        let link = &response["result"]["content"][0];
        assert_eq!(link["type"], "resource_link");
        assert_eq!(link["_meta"]["version"], env!("CARGO_PKG_VERSION"));
        let names: Vec<String> = service()
            .list_tools()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(link["_meta"]["enabledTools"], json!(names));
    }

    #[tokio::test]
    async fn resources_read_invalid_id_is_invalid_params() {
        let response = service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "resources/read",
                "params": { "uri": "mcp://collection/abc" }
            }))
            .await
            .expect("response");

        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["data"]["code"], "invalid_id");
    }

    #[tokio::test]
    async fn resource_templates_are_listed() {
        let response = service()
            .handle_payload(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "resources/templates/list"
            }))
            .await
            .expect("response");

        assert_eq!(
            response["result"]["resourceTemplates"][0]["uriTemplate"],
            "mcp://collection/{id}"
        );
    }
}
