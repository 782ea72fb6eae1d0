use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use profgate_core::value::args_to_json;
use profgate_core::{GateConfig, GateError, HandleRegistry, RequestGate};
use serde_json::{Map, Value, json};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod backend;
mod catalog;
mod tools;
mod util;

pub use backend::{BackendError, BackendOutput, ToolBackend, ToolInvocation, UnavailableBackend};
use catalog::{ToolCatalog, ToolKind, tool_definitions};
use tools::CallState;
use util::{serialized_json_size_bytes, summarize_json_shape, to_pretty_json};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "profgate-mcp";
const TOOL_ENVELOPE_MAX_BYTES: usize = 28_000;
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_CALLS: u16 = 4;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

/// Dispatch permit for one incoming message. Blocking workers hold a clone,
/// so a call that outlives its deadline still counts against the limit.
type CallSlot = Option<Arc<OwnedSemaphorePermit>>;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the profgate MCP server over stdio
    Serve(McpServeArgs),
    /// Check the base directory, paths and tool arguments against the gate, then exit
    Diagnose(McpDiagnoseArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    /// Upper bound on tool calls handled at the same time
    #[arg(
        long,
        env = "PROFGATE_MAX_CONCURRENT_CALLS",
        default_value_t = DEFAULT_MAX_CONCURRENT_CALLS,
        value_parser = clap::value_parser!(u16).range(1..=64)
    )]
    pub max_concurrent_calls: u16,
    /// Deadline for one tool call, gate included
    #[arg(
        long,
        env = "PROFGATE_CALL_TIMEOUT_SECS",
        default_value_t = DEFAULT_CALL_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub call_timeout_secs: u64,
}

#[derive(Args, Clone, Debug)]
pub struct McpDiagnoseArgs {
    /// Path or handle to run through the sandbox (repeatable)
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<String>,
    /// Tool whose arguments should be checked by the gate
    #[arg(long)]
    pub tool: Option<String>,
    /// Tool arguments as a JSON object
    #[arg(long, requires = "tool", value_name = "JSON")]
    pub args: Option<String>,
}

pub async fn run(gate: GateConfig, command: McpCommands) -> i32 {
    run_with_backend(gate, Arc::new(UnavailableBackend), command).await
}

/// Entry point for embedders that wire in real profiling collaborators.
pub async fn run_with_backend(
    gate: GateConfig,
    backend: Arc<dyn ToolBackend>,
    command: McpCommands,
) -> i32 {
    match command {
        McpCommands::Serve(args) => {
            let config = McpRuntimeConfig {
                max_concurrent_calls: usize::from(args.max_concurrent_calls),
                call_timeout: Duration::from_secs(args.call_timeout_secs),
            };
            let server = match McpServer::new(&gate, config, backend) {
                Ok(server) => server,
                Err(err) => return report_startup_error(&err),
            };
            if let Err(err) = server.preflight() {
                return report_startup_error(&err);
            }
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    error!(error = %err, "MCP server stopped");
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Diagnose(args) => {
            let server = match McpServer::new(&gate, McpRuntimeConfig::default(), backend) {
                Ok(server) => server,
                Err(err) => return report_startup_error(&err),
            };
            match server.run_diagnostics(&args) {
                Ok(report) => {
                    println!("{}", to_pretty_json(&report));
                    if report
                        .get("status")
                        .and_then(Value::as_str)
                        .is_some_and(|status| status == "ready")
                    {
                        0
                    } else {
                        2
                    }
                }
                Err(err) => {
                    eprintln!("{}", to_pretty_json(&err.to_value()));
                    1
                }
            }
        }
    }
}

fn report_startup_error(err: &GateError) -> i32 {
    error!(kind = %err.kind(), "startup failed");
    eprintln!("{}", to_pretty_json(&gate_error_value(err)));
    1
}

#[derive(Clone, Debug)]
pub struct McpRuntimeConfig {
    pub max_concurrent_calls: usize,
    pub call_timeout: Duration,
}

impl Default for McpRuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: usize::from(DEFAULT_MAX_CONCURRENT_CALLS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone)]
pub struct McpServer {
    config: McpRuntimeConfig,
    gate: Arc<RequestGate>,
    catalog: Arc<ToolCatalog>,
    backend: Arc<dyn ToolBackend>,
}

impl McpServer {
    pub fn new(
        gate_config: &GateConfig,
        config: McpRuntimeConfig,
        backend: Arc<dyn ToolBackend>,
    ) -> Result<Self, GateError> {
        let (catalog, rules) = ToolCatalog::build(tool_definitions())?;
        let registry = Arc::new(HandleRegistry::new());
        let gate = RequestGate::new(registry, gate_config.sandbox(), rules);
        Ok(Self {
            config,
            gate: Arc::new(gate),
            catalog: Arc::new(catalog),
            backend,
        })
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        self.gate.registry()
    }

    /// Resolve the base directory once so a broken configuration fails the
    /// process instead of the first call.
    pub fn preflight(&self) -> Result<(), GateError> {
        match self.gate.sandbox().canonical_base()? {
            Some(base) => info!(base_dir = %base.display(), "path sandbox enabled"),
            None => warn!("no base directory configured; path sandboxing is disabled"),
        }
        Ok(())
    }

    pub async fn serve_stdio(self) -> Result<(), String> {
        info!(
            tools = self.catalog.entries().len(),
            max_concurrent_calls = self.config.max_concurrent_calls,
            call_timeout_secs = self.config.call_timeout.as_secs(),
            "serving MCP over stdio"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let writer = tokio::spawn(async move {
            let mut stdout = io::stdout();
            while let Some(response) = rx.recv().await {
                write_framed_json(&mut stdout, &response).await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls.max(1)));
        let mut reader = BufReader::new(io::stdin());
        let mut in_flight = JoinSet::new();

        let read_result = loop {
            let incoming = match read_framed_json(&mut reader).await {
                Ok(Some(incoming)) => incoming,
                Ok(None) => break Ok(()),
                Err(e) => break Err(format!("Failed to read MCP message: {e}")),
            };
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break Err("dispatch semaphore closed".to_string());
            };
            let server = self.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let slot = Some(Arc::new(permit));
                for response in server.handle_incoming_message(incoming, &slot).await {
                    if tx.send(response).is_err() {
                        break;
                    }
                }
            });
            while in_flight.try_join_next().is_some() {}
        };

        while in_flight.join_next().await.is_some() {}
        drop(tx);
        let write_result = writer
            .await
            .map_err(|e| format!("MCP writer task failed: {e}"))?
            .map_err(|e| format!("Failed to write MCP response: {e}"));
        info!("stdin closed; MCP server shutting down");
        read_result?;
        write_result
    }

    async fn handle_incoming_message(&self, incoming: Value, slot: &CallSlot) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone(), slot).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming, slot).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value, slot: &CallSlot) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params, slot).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                debug!(method, "notification ignored");
                None
            }
        }
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Value,
        slot: &CallSlot,
    ) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params, slot).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Arguments are checked against each tool's inputSchema \
                before anything runs. \
                Prefer handles (pgh_...) over raw paths. \
                artifact_register, artifacts_list and every tool that writes files return them. \
                Paths must stay inside the server's base directory. \
                On error, fix the argument named in error.field and follow error.docs_hint.",
            "sandbox": { "enabled": self.gate.sandbox().is_enabled() }
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .catalog
            .entries()
            .iter()
            .map(|entry| {
                json!({
                    "name": entry.definition.name,
                    "description": entry.definition.description,
                    "inputSchema": entry.definition.input_schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value, slot: &CallSlot) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?
            .to_string();

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let request_id = Uuid::now_v7().to_string();
        let server = self.clone();
        let worker_tool = name.clone();
        let state = CallState::default();
        let worker_state = state.clone();
        let worker_slot = slot.clone();
        let mut worker = tokio::task::spawn_blocking(move || {
            let _slot = worker_slot;
            server.execute_tool(&worker_tool, &args, &worker_state)
        });
        let outcome = match tokio::time::timeout(self.config.call_timeout, &mut worker).await {
            Ok(joined) => worker_outcome(&name, joined)?,
            // Registry writes already landed; the result is moments away.
            Err(_) if !state.abandon() => worker_outcome(&name, worker.await)?,
            Err(_) => {
                warn!(tool = %name, request_id = %request_id, "tool call timed out");
                Err(ToolError::new(
                    "call_timeout",
                    format!(
                        "'{name}' did not finish within {:.1}s",
                        self.config.call_timeout.as_secs_f64()
                    ),
                )
                .with_docs_hint(
                    "Narrow the request (fewer profiles, lower nodecount) and call again.",
                )
                .into())
            }
        };

        let is_error = outcome.is_err();
        let envelope = match outcome {
            Ok(data) => json!({
                "status": "complete",
                "tool": name,
                "request_id": request_id,
                "data": data
            }),
            Err(failure) => json!({
                "status": "error",
                "tool": name,
                "request_id": request_id,
                "error": failure.to_value()
            }),
        };
        let envelope = enforce_tool_payload_limit(&name, envelope);
        Ok(build_tool_call_response(envelope, is_error))
    }

    /// Gate plus handler for one call. Runs on a blocking worker thread.
    fn execute_tool(
        &self,
        name: &str,
        raw: &Map<String, Value>,
        state: &CallState,
    ) -> Result<Value, CallFailure> {
        let Some(entry) = self.catalog.get(name) else {
            return Err(ToolError::new("unknown_tool", format!("Unknown tool '{name}'"))
                .with_field("name")
                .with_docs_hint("Call tools/list for the available tools.")
                .with_details(json!({ "available_tools": self.catalog.names() }))
                .into());
        };

        let args = self
            .gate
            .admit(name, &entry.schema, &entry.definition.paths, raw)?;
        match entry.definition.kind {
            ToolKind::Register => tools::register_artifact(&self.gate, state, &args),
            ToolKind::List => tools::list_artifacts(&self.gate, &args),
            ToolKind::Describe => tools::describe_artifact(&self.gate, &args),
            ToolKind::BundleResolve => tools::resolve_bundle(&self.gate, &args),
            ToolKind::Backend { bundle } => tools::run_backend(
                &self.gate,
                state,
                self.backend.as_ref(),
                name,
                bundle,
                args,
            ),
        }
    }

    fn run_diagnostics(&self, args: &McpDiagnoseArgs) -> Result<Value, ToolError> {
        let mut rejected = false;
        let sandbox = self.gate.sandbox();

        let base_dir = match sandbox.base_dir() {
            None => json!({ "configured": false, "status": "disabled" }),
            Some(configured) => match sandbox.canonical_base() {
                Ok(canonical) => json!({
                    "configured": true,
                    "path": configured.display().to_string(),
                    "status": "accepted",
                    "canonical": canonical.map(|path| path.display().to_string())
                }),
                Err(err) => {
                    rejected = true;
                    json!({
                        "configured": true,
                        "path": configured.display().to_string(),
                        "status": "rejected",
                        "error": gate_error_value(&err)
                    })
                }
            },
        };

        let paths: Vec<Value> = args
            .paths
            .iter()
            .map(|raw| match self.gate.resolve_path("path", raw) {
                Ok(resolved) => json!({
                    "input": raw,
                    "status": "accepted",
                    "resolved": resolved.display().to_string()
                }),
                Err(err) => {
                    rejected = true;
                    json!({
                        "input": raw,
                        "status": "rejected",
                        "error": gate_error_value(&err)
                    })
                }
            })
            .collect();

        let tool = match &args.tool {
            None => Value::Null,
            Some(name) => {
                let entry = self.catalog.get(name).ok_or_else(|| {
                    ToolError::new("unknown_tool", format!("Unknown tool '{name}'"))
                        .with_field("tool")
                        .with_details(json!({ "available_tools": self.catalog.names() }))
                })?;
                let raw = match args.args.as_deref() {
                    None => Map::new(),
                    Some(text) => match serde_json::from_str::<Value>(text) {
                        Ok(Value::Object(map)) => map,
                        Ok(_) => {
                            return Err(ToolError::new(
                                "invalid_diagnose_args",
                                "--args must be a JSON object",
                            )
                            .with_field("args"));
                        }
                        Err(err) => {
                            return Err(ToolError::new(
                                "invalid_diagnose_args",
                                format!("--args is not valid JSON: {err}"),
                            )
                            .with_field("args"));
                        }
                    },
                };
                match self
                    .gate
                    .admit(name, &entry.schema, &entry.definition.paths, &raw)
                {
                    Ok(cleaned) => json!({
                        "name": name,
                        "status": "accepted",
                        "arguments": Value::Object(args_to_json(&cleaned))
                    }),
                    Err(err) => {
                        rejected = true;
                        json!({
                            "name": name,
                            "status": "rejected",
                            "error": gate_error_value(&err)
                        })
                    }
                }
            }
        };

        Ok(json!({
            "status": if rejected { "rejected" } else { "ready" },
            "server": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "base_dir": base_dir,
            "paths": paths,
            "tool": tool
        }))
    }
}

fn worker_outcome(
    tool: &str,
    joined: Result<Result<Value, CallFailure>, JoinError>,
) -> Result<Result<Value, CallFailure>, RpcError> {
    joined.map_err(|join_error| {
        error!(tool, error = %join_error, "tool worker failed");
        RpcError::internal_error(format!("tool worker for '{tool}' stopped unexpectedly"))
    })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }

    fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
        }
    }
}

/// Runtime-level failure that is not a gate rejection.
#[derive(Debug, Clone)]
struct ToolError {
    code: String,
    message: String,
    field: Option<String>,
    docs_hint: Option<String>,
    details: Option<Value>,
}

impl ToolError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(docs_hint) = &self.docs_hint {
            payload["docs_hint"] = Value::String(docs_hint.clone());
        }
        if let Some(details) = &self.details {
            payload["details"] = details.clone();
        }
        payload
    }
}

#[derive(Debug)]
enum CallFailure {
    Gate(GateError),
    Tool(ToolError),
}

impl From<GateError> for CallFailure {
    fn from(err: GateError) -> Self {
        CallFailure::Gate(err)
    }
}

impl From<ToolError> for CallFailure {
    fn from(err: ToolError) -> Self {
        CallFailure::Tool(err)
    }
}

impl CallFailure {
    fn to_value(&self) -> Value {
        match self {
            CallFailure::Gate(err) => gate_error_value(err),
            CallFailure::Tool(err) => err.to_value(),
        }
    }
}

fn gate_error_value(err: &GateError) -> Value {
    serde_json::to_value(err.to_payload()).unwrap_or_else(|_| {
        json!({
            "error": err.kind().as_str(),
            "message": err.to_string()
        })
    })
}

fn build_tool_call_response(envelope: Value, is_error: bool) -> Value {
    // Agents read the text block, not structuredContent; inline everything.
    let text = to_pretty_json(&envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

fn payload_reload_hint(tool: &str) -> String {
    format!(
        "Call {tool} again with a narrower request (lower limit or nodecount). \
         Files it produced stay reachable through artifacts_list."
    )
}

fn enforce_tool_payload_limit(tool: &str, envelope: Value) -> Value {
    let original_bytes = serialized_json_size_bytes(&envelope);
    if original_bytes <= TOOL_ENVELOPE_MAX_BYTES {
        return envelope;
    }

    let status = envelope
        .get("status")
        .cloned()
        .unwrap_or_else(|| Value::String("complete".to_string()));
    let request_id = envelope.get("request_id").cloned().unwrap_or(Value::Null);
    let truncation = |strategy: &str| {
        json!({
            "reason": "payload_size_limit",
            "strategy": strategy,
            "limit_bytes": TOOL_ENVELOPE_MAX_BYTES,
            "original_bytes": original_bytes,
            "details_hint": payload_reload_hint(tool)
        })
    };

    let mut fallback = json!({
        "status": status,
        "tool": tool,
        "request_id": request_id,
        "truncated": true,
        "truncation": truncation("summary_only")
    });
    if let Some(data) = envelope.get("data") {
        fallback["data_summary"] = summarize_json_shape(data);
    }
    if let Some(error) = envelope.get("error") {
        fallback["error_summary"] = summarize_json_shape(error);
    }

    if serialized_json_size_bytes(&fallback) > TOOL_ENVELOPE_MAX_BYTES {
        json!({
            "status": status,
            "tool": tool,
            "request_id": request_id,
            "truncated": true,
            "truncation": truncation("minimal_fallback")
        })
    } else {
        fallback
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

async fn read_framed_json<R>(reader: &mut R) -> Result<Option<Value>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        if line == "\r\n" {
            break;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            if parsed > MAX_FRAME_BYTES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "Content-Length {parsed} exceeds the {MAX_FRAME_BYTES}-byte frame limit"
                    ),
                ));
            }
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let json: Value = serde_json::from_slice(&payload).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid JSON payload: {e}"),
        )
    })?;
    Ok(Some(json))
}

async fn write_framed_json<W>(writer: &mut W, value: &Value) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    let header = format!(
        "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
        body.len()
    );
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
