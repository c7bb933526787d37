//! The step loop.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_config::AppConfig;
use stepwise_core::agent::{RunState, RunStatus, StateContainer};
use stepwise_core::event::{AgentEvent, ErrorSource, EventChannel, EventPayload};
use stepwise_core::message::Message;
use stepwise_core::provider::{Provider, ProviderRequest, ToolDefinition};
use stepwise_core::tool::{ToolCall, ToolRegistry, ToolResult};
use stepwise_core::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatcher::ToolDispatcher;
use crate::history::HistoryManager;
use crate::retry::RetryPolicy;
use crate::summarizer::{ProviderSummarizer, Summarizer};

/// Returned when a run observes a cancellation request.
pub const CANCELLED_MESSAGE: &str = "Task cancelled by user.";

/// Text returned when the step budget runs out without a final answer.
pub fn exhausted_message(max_steps: u32) -> String {
    format!("Task couldn't be completed after {max_steps} steps.")
}

/// Input of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub max_steps: u32,
}

impl RunRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            max_steps: 50,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Result of one run.
///
/// `text` alone does not tell a fatal error from an answer; check
/// `state.status`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub text: String,
    pub state: RunState,
    pub history: Vec<Message>,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn is_error(&self) -> bool {
        self.state.status == RunStatus::Error
    }
}

/// Drives a run: backend call, tool dispatch, compaction, events.
///
/// One `AgentLoop` may serve any number of concurrent runs; each run owns its
/// own history, state, and observers.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    summarizer: Arc<dyn Summarizer>,
    retry: RetryPolicy,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    token_limit: usize,
    keep_recent: usize,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        let model = model.into();
        let summarizer = Arc::new(ProviderSummarizer::new(provider.clone(), model.clone()));
        Self {
            provider,
            dispatcher: ToolDispatcher::new(tools),
            summarizer,
            retry: RetryPolicy::default(),
            model,
            temperature: 0.7,
            max_tokens: None,
            token_limit: 80_000,
            keep_recent: 6,
        }
    }

    /// Build a loop from the `[llm]`, `[retry]` and `[agent]` sections.
    pub fn from_config(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        let summarizer = ProviderSummarizer::new(provider.clone(), config.llm.model.clone())
            .with_retry(retry.clone());
        let agent = &config.agent;

        let mut this = Self::new(provider, tools, config.llm.model.clone())
            .with_retry(retry)
            .with_summarizer(Arc::new(summarizer))
            .with_temperature(config.llm.temperature)
            .with_token_limit(agent.token_limit)
            .with_keep_recent(agent.keep_recent_messages)
            .with_tool_concurrency(agent.tool_concurrency)
            .with_tool_timeout(agent.tool_timeout_secs.map(Duration::from_secs));
        this.max_tokens = config.llm.max_tokens;
        this
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Estimated history size above which compaction runs.
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    /// Messages preserved verbatim by compaction.
    pub fn with_keep_recent(mut self, keep: usize) -> Self {
        self.keep_recent = keep;
        self
    }

    pub fn with_tool_concurrency(mut self, limit: usize) -> Self {
        self.dispatcher = self.dispatcher.with_concurrency(limit);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Execute one run to a terminal status.
    ///
    /// Recoverable faults (tool failures, summarization failures, observer
    /// panics) are reported as data and never end the run. A fatal backend
    /// fault ends it with `RunStatus::Error`.
    pub async fn run(&self, request: RunRequest, events: EventChannel, cancel: CancellationToken) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        let max_steps = request.max_steps;
        let mut run = Run {
            emitter: Emitter {
                run_id: run_id.clone(),
                channel: events.clone(),
            },
            state: StateContainer::new(RunState::new(&run_id, max_steps), events.observers().to_vec()),
            history: HistoryManager::new(request.system_prompt, self.keep_recent),
        };
        run.history.append(Message::user(request.user_message));

        info!(run_id = %run_id, model = %self.model, max_steps, tools = self.tools().len(), "Starting run");
        run.state.update(|s| {
            s.status = RunStatus::Running;
            s.start_time = Some(Utc::now());
        });
        run.emitter.emit(EventPayload::RunStart { max_steps });

        let tool_definitions = self.tools().definitions();

        for step in 1..=max_steps {
            if cancel.is_cancelled() {
                return run.cancelled();
            }

            match self.step(&mut run, step, &tool_definitions).await {
                StepOutcome::Continue => {}
                StepOutcome::Finished(text) => return run.finish(text),
            }
        }

        if cancel.is_cancelled() {
            return run.cancelled();
        }

        let text = exhausted_message(max_steps);
        warn!(run_id = %run_id, max_steps, "Step budget exhausted without a final answer");
        run.state.update(|s| {
            s.status = RunStatus::Completed;
            s.last_response = Some(text.clone());
        });
        run.emitter.emit(EventPayload::RunEnd {
            content: text.clone(),
            exhausted: true,
        });
        run.finish(text)
    }

    async fn step(&self, run: &mut Run, step: u32, tool_definitions: &[ToolDefinition]) -> StepOutcome {
        let step_started = Instant::now();
        let max_steps = run.state.get().max_steps;
        run.state.update(|s| {
            s.current_step = step;
            s.step_start_time = Some(Utc::now());
        });
        run.emitter.emit(EventPayload::StepStart { step, max_steps });

        let messages = run.history.snapshot();
        run.emitter.emit(EventPayload::LlmRequest {
            step,
            message_count: messages.len(),
            estimated_tokens: run.history.estimated_tokens(),
        });
        debug!(run_id = %run.emitter.run_id, step, messages = messages.len(), "Calling backend");

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tool_definitions.to_vec(),
        };
        let provider = self.provider.clone();
        let response = match self
            .retry
            .call(|| {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let text = e.to_string();
                run.state.update(|s| {
                    s.status = RunStatus::Error;
                    s.last_error = Some(text.clone());
                });
                run.emitter.emit(EventPayload::Error {
                    source: ErrorSource::Backend,
                    message: text.clone(),
                    attempts: Some(e.attempts),
                });
                return StepOutcome::Finished(text);
            }
        };

        let message = response.message;
        run.emitter.emit(EventPayload::LlmResponse {
            step,
            content: message.content.clone(),
            thinking: message.thinking.clone(),
            tool_call_count: message.tool_calls.len(),
            finish_reason: response.finish_reason.clone(),
        });

        if let Some(usage) = response.usage {
            run.history.record_reported_prompt_tokens(usage.prompt_tokens);
            run.state.update(|s| s.total_tokens += u64::from(usage.total_tokens));
            run.emitter.emit(EventPayload::TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                run_total_tokens: run.state.get().total_tokens,
            });
        }

        if message.tool_calls.is_empty() {
            let content = message.content.clone();
            run.history.append(message);
            run.state.update(|s| {
                s.status = RunStatus::Completed;
                s.last_response = Some(content.clone());
            });
            info!(run_id = %run.emitter.run_id, step, "Run completed with a final answer");
            run.emitter.emit(EventPayload::RunEnd {
                content: content.clone(),
                exhausted: false,
            });
            return StepOutcome::Finished(content);
        }

        let calls = message.tool_calls.clone();
        run.history.append(message);

        let results = self.execute_tools(&run.emitter, step, &calls).await;

        self.compact(run).await;

        for (call, result) in calls.iter().zip(&results) {
            run.history.append(Message::from_tool_result(result, &call.name));
        }

        run.emitter.emit(EventPayload::StepEnd {
            step,
            elapsed_ms: step_started.elapsed().as_millis() as u64,
        });
        StepOutcome::Continue
    }

    /// Run the step's tool calls and emit their events.
    ///
    /// Sequential dispatch interleaves TOOL_CALL/TOOL_RESULT per call.
    /// Concurrent dispatch announces every call, then reports every result,
    /// both in request order.
    async fn execute_tools(&self, emitter: &Emitter, step: u32, calls: &[ToolCall]) -> Vec<ToolResult> {
        debug!(run_id = %emitter.run_id, step, count = calls.len(), "Executing tool calls");

        if self.dispatcher.concurrency() <= 1 || calls.len() == 1 {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                emitter.tool_call(step, call);
                let (result, elapsed) = self.dispatcher.dispatch_timed(call).await;
                emitter.tool_result(step, call, &result, elapsed);
                results.push(result);
            }
            return results;
        }

        for call in calls {
            emitter.tool_call(step, call);
        }
        let dispatched = self.dispatcher.dispatch_all(calls).await;
        calls
            .iter()
            .zip(dispatched)
            .map(|(call, (result, elapsed))| {
                emitter.tool_result(step, call, &result, elapsed);
                result
            })
            .collect()
    }

    async fn compact(&self, run: &mut Run) {
        match run.history.maybe_compact(self.token_limit, self.summarizer.as_ref()).await {
            Ok(Some(report)) => run.emitter.emit(EventPayload::Summarize {
                before_tokens: report.before_tokens,
                after_tokens: report.after_tokens,
                summarized_messages: report.summarized_messages,
                kept_messages: report.kept_messages,
            }),
            Ok(None) => {}
            Err(e) => {
                warn!(run_id = %run.emitter.run_id, error = %e, "Summarization failed, keeping full history");
                run.emitter.emit(EventPayload::Error {
                    source: ErrorSource::Summarization,
                    message: e.to_string(),
                    attempts: None,
                });
            }
        }
    }
}

enum StepOutcome {
    Continue,
    Finished(String),
}

/// Per-run state owned by one invocation of [`AgentLoop::run`].
struct Run {
    emitter: Emitter,
    state: StateContainer,
    history: HistoryManager,
}

impl Run {
    fn cancelled(mut self) -> RunOutcome {
        let step = self.state.get().current_step;
        info!(run_id = %self.emitter.run_id, step, "Run cancelled");
        self.state.update(|s| {
            s.status = RunStatus::Cancelled;
            s.last_response = Some(CANCELLED_MESSAGE.to_string());
        });
        self.emitter.emit(EventPayload::Cancelled { step });
        self.finish(CANCELLED_MESSAGE.to_string())
    }

    fn finish(self, text: String) -> RunOutcome {
        RunOutcome {
            text,
            state: self.state.snapshot(),
            history: self.history.into_messages(),
        }
    }
}

struct Emitter {
    run_id: String,
    channel: EventChannel,
}

impl Emitter {
    fn emit(&self, payload: EventPayload) {
        self.channel.emit(AgentEvent::new(&self.run_id, payload));
    }

    fn tool_call(&self, step: u32, call: &ToolCall) {
        self.emit(EventPayload::ToolCall {
            step,
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        });
    }

    fn tool_result(&self, step: u32, call: &ToolCall, result: &ToolResult, elapsed: Duration) {
        self.emit(EventPayload::ToolResult {
            step,
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: result.is_success(),
            content: result.content().map(str::to_string),
            error: result.error().map(str::to_string),
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }
}
