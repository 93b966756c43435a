use crate::context::ToolExecutionContext;
use crate::error::{ClassifiedError, ErrorCode};
use crate::tool::{ToolCallResult, ToolDefinition, ToolExecutor};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Name-keyed executors and the single dispatch point for tool calls.
///
/// Every failure (unknown tool, executor error, executor panic) comes back
/// as a failed [`ToolCallResult`]; `execute` never errors or unwinds.
pub struct ToolRegistry {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor under its name. Last write wins; the replaced
    /// executor is returned.
    pub fn register(&mut self, executor: impl ToolExecutor + 'static) -> Option<Arc<dyn ToolExecutor>> {
        self.register_arc(Arc::new(executor))
    }

    pub fn register_arc(&mut self, executor: Arc<dyn ToolExecutor>) -> Option<Arc<dyn ToolExecutor>> {
        let name = executor.name();
        let replaced = self.executors.insert(name.clone(), executor);
        if replaced.is_some() {
            debug!(tool = %name, "Replaced previously registered tool executor");
        }
        replaced
    }

    pub fn register_all<I>(&mut self, executors: I)
    where
        I: IntoIterator<Item = Arc<dyn ToolExecutor>>,
    {
        for executor in executors {
            self.register_arc(executor);
        }
    }

    /// Look up an executor by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }

    /// All definitions, sorted by name (for sending to the LLM).
    pub fn all_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.executors.values().map(|e| e.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn definitions_by_category(&self, category: &str) -> Vec<ToolDefinition> {
        self.all_definitions()
            .into_iter()
            .filter(|d| d.category.as_deref() == Some(category))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Dispatch one call, measuring wall-clock duration.
    ///
    /// The returned result has an empty `tool_call_id`; callers that track
    /// calls attach it with [`ToolCallResult::with_call_id`].
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        context: &ToolExecutionContext,
    ) -> ToolCallResult {
        let Some(executor) = self.get(name) else {
            warn!(tool = %name, "Tool not registered");
            return ToolCallResult::failed(
                name,
                ClassifiedError::tool_not_found(name).with_locale(context.locale),
            );
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(executor.execute(args, context))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(Ok(value)) => {
                debug!(tool = %name, duration_ms = elapsed.as_millis() as u64, "Tool succeeded");
                ToolCallResult::ok(name, value)
            }
            Ok(Err(err)) => {
                warn!(
                    tool = %name,
                    code = %err.code,
                    duration_ms = elapsed.as_millis() as u64,
                    error = %err.message,
                    "Tool failed"
                );
                ToolCallResult::failed(name, err.with_locale(context.locale))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = %name, panic = %message, "Tool executor panicked");
                ToolCallResult::failed(
                    name,
                    ClassifiedError::localized(
                        ErrorCode::ExecutionError,
                        format!("Tool '{}' panicked: {}", name, message),
                        context.locale,
                    ),
                )
            }
        };

        result.with_duration(elapsed)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{EchoTool, ParameterType, ToolParameter};
    use async_trait::async_trait;
    use flowtool_core::Locale;
    use serde_json::json;

    struct PanickingTool;

    #[async_trait]
    impl ToolExecutor for PanickingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("explode", "Always panics").with_category("testing")
        }

        async fn execute(
            &self,
            _args: Value,
            _context: &ToolExecutionContext,
        ) -> Result<Value, ClassifiedError> {
            panic!("kaboom");
        }
    }

    /// Same name as [`EchoTool`], different behavior.
    struct ShoutingEcho;

    #[async_trait]
    impl ToolExecutor for ShoutingEcho {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("echo", "Echoes in upper case").with_parameter(
                ToolParameter::new("message", ParameterType::String, "Message").required(),
            )
        }

        async fn execute(
            &self,
            args: Value,
            _context: &ToolExecutionContext,
        ) -> Result<Value, ClassifiedError> {
            let message = args["message"].as_str().unwrap_or_default();
            Ok(json!(message.to_uppercase()))
        }
    }

    fn ctx() -> ToolExecutionContext {
        ToolExecutionContext::new("org", "user")
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(EchoTool).is_none());

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        assert!(registry.register(ShoutingEcho).is_some());
        assert_eq!(registry.len(), 1);

        let result = registry.execute("echo", json!({"message": "hi"}), &ctx()).await;
        assert_eq!(result.result, Some(json!("HI")));
    }

    #[test]
    fn test_definitions_by_category() {
        let mut registry = ToolRegistry::new();
        registry.register_all(vec![
            Arc::new(EchoTool) as Arc<dyn ToolExecutor>,
            Arc::new(PanickingTool),
        ]);

        let all = registry.all_definitions();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "echo");
        assert_eq!(registry.definitions_by_category("testing").len(), 2);
        assert!(registry.definitions_by_category("social").is_empty());
    }

    #[tokio::test]
    async fn test_execute_success_records_duration() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let result = registry.execute("echo", json!({"message": "hello"}), &ctx()).await;
        assert!(result.success);
        assert_eq!(result.tool_name, "echo");
        assert_eq!(result.result, Some(json!("hello")));
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_execute_missing_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let result = registry.execute("missing_tool", json!({}), &ctx()).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("missing_tool"));
        assert_eq!(result.error_code(), Some(ErrorCode::ToolNotFound));
    }

    #[tokio::test]
    async fn test_executor_error_is_localized() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let zh = ctx().with_locale(Locale::Zh);
        let result = registry.execute("echo", json!({}), &zh).await;
        assert!(!result.success);
        let details = result.error_details.unwrap();
        assert_eq!(details.code, ErrorCode::InvalidParams);
        assert_eq!(
            details.user_message,
            ClassifiedError::localized(ErrorCode::InvalidParams, "", Locale::Zh).user_message
        );
    }

    #[tokio::test]
    async fn test_executor_panic_becomes_failed_result() {
        let mut registry = ToolRegistry::new();
        registry.register(PanickingTool);

        let result = registry.execute("explode", json!({}), &ctx()).await;
        assert!(!result.success);
        assert_eq!(result.error_code(), Some(ErrorCode::ExecutionError));
        assert!(result.error.unwrap().contains("kaboom"));
    }
}
