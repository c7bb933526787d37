//! Tool dispatch: lookup, schema validation, isolation, and result shaping.
//!
//! `dispatch` is total: every call yields a [`ToolResult`]. Unknown tools and
//! schema-invalid arguments never reach the tool body. Tool errors, panics and
//! timeouts all become failure results.

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use jsonschema::JSONSchema;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolCall, ToolRegistry, ToolResult};
use tracing::{debug, warn};

/// Executes tool calls against a shared, read-only registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    schemas: Arc<HashMap<String, CompiledSchema>>,
    concurrency: usize,
    timeout: Option<Duration>,
}

/// A tool's parameter schema, compiled once when the dispatcher is built.
/// A schema that fails to compile keeps its error so every call reports it.
type CompiledSchema = Result<JSONSchema, String>;

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        let schemas = registry
            .iter()
            .map(|tool| (tool.name().to_string(), compile_schema(tool)))
            .collect();
        Self {
            registry,
            schemas: Arc::new(schemas),
            concurrency: 4,
            timeout: None,
        }
    }

    /// Maximum calls from one step executing at once. `1` means sequential.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Dispatch one call.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, call_id = %call.id, "Model requested an unknown tool");
            return ToolResult::failure(&call.id, ToolError::NotFound(call.name.clone()).to_string());
        };

        if let Err(detail) = self.validate_arguments(&call.name, &call.arguments) {
            debug!(tool = %call.name, call_id = %call.id, %detail, "Rejected tool arguments");
            return ToolResult::failure(
                &call.id,
                ToolError::InvalidArguments(detail).to_string(),
            );
        }

        match self.execute_isolated(tool, call).await {
            Ok(content) => ToolResult::success(&call.id, content),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                ToolResult::failure(&call.id, e.to_string())
            }
        }
    }

    /// Dispatch one call and measure how long it took.
    pub async fn dispatch_timed(&self, call: &ToolCall) -> (ToolResult, Duration) {
        let start = Instant::now();
        let result = self.dispatch(call).await;
        (result, start.elapsed())
    }

    /// Dispatch every call with bounded concurrency.
    ///
    /// Results come back in the order of `calls`, whatever order the
    /// executions finish in.
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<(ToolResult, Duration)> {
        stream::iter(calls.iter().map(|call| self.dispatch_timed(call)))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn execute_isolated(&self, tool: &dyn Tool, call: &ToolCall) -> Result<String, ToolError> {
        let execution = AssertUnwindSafe(tool.execute(call.arguments.clone())).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout: limit,
                    });
                }
            },
            None => execution.await,
        };

        outcome.unwrap_or_else(|payload| {
            Err(ToolError::Panicked {
                tool_name: call.name.clone(),
                message: panic_message(payload.as_ref()),
            })
        })
    }

    /// Check `arguments` against the named tool's compiled schema.
    fn validate_arguments(&self, tool_name: &str, arguments: &serde_json::Value) -> Result<(), String> {
        let compiled = match self.schemas.get(tool_name) {
            Some(Ok(compiled)) => compiled,
            Some(Err(e)) => return Err(e.clone()),
            None => return Err(format!("no compiled schema for tool '{tool_name}'")),
        };

        match compiled.validate(arguments) {
            Ok(()) => Ok(()),
            Err(errors) => {
                let details: Vec<String> = errors.map(|e| e.to_string()).collect();
                Err(details.join("; "))
            }
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.registry.names())
            .field("compiled_schemas", &self.schemas.len())
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn compile_schema(tool: &dyn Tool) -> CompiledSchema {
    let schema = tool.parameters_schema();
    JSONSchema::compile(&schema)
        .map_err(|e| format!("tool '{}' declares an invalid parameter schema: {e}", tool.name()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        calls: Arc<AtomicUsize>,
        schema_reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "calc"
        }
        fn description(&self) -> &str {
            "Evaluates an arithmetic expression"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            self.schema_reads.fetch_add(1, Ordering::SeqCst);
            json!({
                "type": "object",
                "properties": { "expr": { "type": "string" } },
                "required": ["expr"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match arguments["expr"].as_str() {
                Some("2+2") => Ok("4".into()),
                Some("boom") => panic!("calculator exploded"),
                Some("slow") => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok("late".into())
                }
                Some(other) => Err(ToolError::failed("calc", format!("cannot evaluate {other}"))),
                None => unreachable!("schema requires expr"),
            }
        }
    }

    fn counting_registry(calls: Arc<AtomicUsize>, schema_reads: Arc<AtomicUsize>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountingTool { calls, schema_reads }));
        registry
    }

    fn dispatcher() -> (ToolDispatcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone(), Arc::new(AtomicUsize::new(0)));
        (ToolDispatcher::new(Arc::new(registry)), calls)
    }

    #[tokio::test]
    async fn successful_call() {
        let (dispatcher, calls) = dispatcher();
        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "calc", json!({"expr": "2+2"})))
            .await;
        assert_eq!(result, ToolResult::success("c1", "4"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tool_never_invokes_anything() {
        let (dispatcher, calls) = dispatcher();
        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "nope", json!({"expr": "2+2"})))
            .await;
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("unknown tool: nope"));
        assert_eq!(
            result.error(),
            Some(ToolError::NotFound("nope".into()).to_string().as_str())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn schemas_are_compiled_once_per_dispatcher() {
        let schema_reads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)), schema_reads.clone());
        let dispatcher = ToolDispatcher::new(Arc::new(registry));
        let after_build = schema_reads.load(Ordering::SeqCst);
        assert_eq!(after_build, 1);

        for i in 0..5 {
            let ok = dispatcher
                .dispatch(&ToolCall::new(format!("c{i}"), "calc", json!({"expr": "2+2"})))
                .await;
            assert!(ok.is_success());
            let bad = dispatcher
                .dispatch(&ToolCall::new(format!("d{i}"), "calc", json!({})))
                .await;
            assert!(!bad.is_success());
        }
        assert_eq!(schema_reads.load(Ordering::SeqCst), after_build);
    }

    struct InvalidSchemaTool;

    #[async_trait]
    impl Tool for InvalidSchemaTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Declares a schema that does not compile"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": 12})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok("ran".into())
        }
    }

    #[tokio::test]
    async fn invalid_declared_schema_rejects_every_call() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(InvalidSchemaTool));
        let dispatcher = ToolDispatcher::new(Arc::new(registry));

        for id in ["c1", "c2"] {
            let result = dispatcher.dispatch(&ToolCall::new(id, "broken", json!({}))).await;
            assert!(result.error().unwrap().contains("invalid parameter schema"));
        }
    }

    #[tokio::test]
    async fn invalid_arguments_never_invoke_the_body() {
        let (dispatcher, calls) = dispatcher();

        let missing = dispatcher.dispatch(&ToolCall::new("c1", "calc", json!({}))).await;
        assert!(missing.error().unwrap().contains("expr"));

        let wrong_type = dispatcher
            .dispatch(&ToolCall::new("c2", "calc", json!({"expr": 4})))
            .await;
        assert!(!wrong_type.is_success());

        let not_an_object = dispatcher
            .dispatch(&ToolCall::new("c3", "calc", json!("{broken json")))
            .await;
        assert!(!not_an_object.is_success());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_error_becomes_failure() {
        let (dispatcher, _) = dispatcher();
        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "calc", json!({"expr": "1/0"})))
            .await;
        assert!(result.error().unwrap().contains("cannot evaluate 1/0"));
    }

    #[tokio::test]
    async fn panicking_tool_becomes_failure() {
        let (dispatcher, _) = dispatcher();
        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "calc", json!({"expr": "boom"})))
            .await;
        let error = result.error().unwrap();
        assert!(error.contains("panicked"), "{error}");
        assert!(error.contains("calculator exploded"), "{error}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_failure() {
        let (dispatcher, _) = dispatcher();
        let dispatcher = dispatcher.with_timeout(Some(Duration::from_secs(2)));
        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "calc", json!({"expr": "slow"})))
            .await;
        assert!(result.error().unwrap().contains("timed out"));
        assert!(result.error().unwrap().contains("after 2s"));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_timeout_is_reported_in_millis() {
        let (dispatcher, _) = dispatcher();
        let dispatcher = dispatcher.with_timeout(Some(Duration::from_millis(250)));
        let result = dispatcher
            .dispatch(&ToolCall::new("c1", "calc", json!({"expr": "slow"})))
            .await;
        let error = result.error().unwrap();
        assert!(error.contains("after 250ms"), "{error}");
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_all_preserves_request_order() {
        let (dispatcher, calls) = dispatcher();
        let dispatcher = dispatcher.with_concurrency(3);
        let batch = vec![
            ToolCall::new("a", "calc", json!({"expr": "slow"})),
            ToolCall::new("b", "calc", json!({"expr": "2+2"})),
            ToolCall::new("c", "missing", json!({})),
        ];

        let results = dispatcher.dispatch_all(&batch).await;
        let ids: Vec<&str> = results.iter().map(|(r, _)| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results[0].0.is_success());
        assert!(!results[2].0.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
