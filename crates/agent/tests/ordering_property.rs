//! Property-style check of the tool ordering invariant.
//!
//! A seeded generator produces many random runs (mixed valid, invalid and
//! unknown tool calls, various concurrency limits, aggressive compaction).
//! After every run the transcript must keep each tool result inside the group
//! that directly follows the assistant message which requested it, in
//! request order.

mod common;

use common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;
use stepwise_agent::{AgentLoop, RunRequest};
use stepwise_core::message::find_ordering_violation;
use stepwise_core::{
    CancellationToken, EventChannel, EventPayload, ProviderResponse, Role, ToolCall, ToolRegistry,
};

fn random_call(rng: &mut StdRng, id: String) -> ToolCall {
    match rng.random_range(0..5) {
        0 => ToolCall::new(id, "calc", json!({"expr": format!("{}+{}", rng.random_range(0..9), rng.random_range(0..9))})),
        1 => ToolCall::new(id, "sleep", json!({"ms": rng.random_range(0..40), "label": "zz"})),
        2 => ToolCall::new(id, "calc", json!({"expr": 7})),
        3 => ToolCall::new(id, "not_registered", json!({})),
        _ => ToolCall::new(id, "calc", json!({"expr": "1+x"})),
    }
}

fn random_script(rng: &mut StdRng, run: usize) -> (Vec<ProviderResponse>, Vec<Vec<String>>) {
    let steps = rng.random_range(0..6);
    let mut script = Vec::new();
    let mut requested = Vec::new();
    for step in 0..steps {
        let count = rng.random_range(1..5);
        let calls: Vec<ToolCall> = (0..count)
            .map(|i| random_call(rng, format!("r{run}_s{step}_c{i}")))
            .collect();
        requested.push(calls.iter().map(|c| c.id.clone()).collect());
        let mut response = tool_response(calls);
        response.message.content = "w".repeat(rng.random_range(0..300));
        script.push(response);
    }
    script.push(text_response("final"));
    (script, requested)
}

#[tokio::test(start_paused = true)]
async fn transcripts_keep_results_with_their_requests() {
    let mut rng = StdRng::seed_from_u64(0x5eed_u64);

    for run in 0..60 {
        let (script, requested) = random_script(&mut rng, run);
        let steps_needed = requested.len() as u32 + 1;
        let max_steps = rng.random_range(1..=steps_needed + 1);

        let (calc, _) = CalcTool::counted();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(calc));
        registry.register(Box::new(SleepTool));

        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::ok(script)),
            Arc::new(registry),
            "mock-model",
        )
        .with_summarizer(Arc::new(StaticSummarizer::ok()))
        .with_tool_concurrency(rng.random_range(1..=4))
        .with_token_limit(rng.random_range(40..600))
        .with_keep_recent(rng.random_range(0..5));
        let log = Arc::new(EventLog::default());

        let outcome = agent
            .run(
                RunRequest::new("sys", "go").with_max_steps(max_steps),
                EventChannel::new().with(log.clone()),
                CancellationToken::new(),
            )
            .await;

        let history = &outcome.history;
        assert_eq!(history[0].role, Role::System, "run {run}");
        assert_eq!(find_ordering_violation(history), None, "run {run}: {history:#?}");
        assert!(outcome.state.current_step <= max_steps, "run {run}");

        // Every tool group in the transcript matches its request order
        for (idx, msg) in history.iter().enumerate() {
            if !msg.requests_tools() {
                continue;
            }
            let expected: Vec<&str> = msg.tool_calls.iter().map(|c| c.id.as_str()).collect();
            let actual: Vec<&str> = history[idx + 1..]
                .iter()
                .take_while(|m| m.role == Role::Tool)
                .filter_map(|m| m.tool_call_id.as_deref())
                .collect();
            assert_eq!(actual, expected, "run {run}");
        }

        // TOOL_RESULT events follow request order within each step
        let executed = requested.len().min(max_steps as usize);
        let mut results: Vec<Vec<String>> = vec![Vec::new(); executed];
        for event in log.events() {
            if let EventPayload::ToolResult { step, call_id, .. } = event.payload {
                results[step as usize - 1].push(call_id);
            }
        }
        assert_eq!(results, requested[..executed].to_vec(), "run {run}");
    }
}
