//! Iterative Agent — the LLM-driven retrieval loop:
//! `planning -> acting -> reflecting -> {planning, answering}`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent::tools::{canonicalize, estimate_tokens, ToolExecution, ToolExecutor};
use crate::config::AgentConfig;
use crate::embedding::Embedder;
use crate::error::{LlmError, LlmResult};
use crate::llm::{AgentPlan, LlmClient, ToolCall};
use crate::types::ElementId;

const TOOL_SCHEMAS: &str = r#"
- search: {"query": string, "top_k": int} -> ranked elements
- skim: {"ids": [string]} -> signature + first 20 lines per id
- read_file: {"path": string, "start_line": int?, "end_line": int?} -> raw source slice
- expand_neighbors: {"ids": [string], "hops": int} -> related ids via the dependency/inheritance/call graphs
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    HighConfidence,
    MaxRounds,
    BudgetExhausted,
    AgentGaveUp,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::HighConfidence => "high_confidence",
            StopReason::MaxRounds => "max_rounds",
            StopReason::BudgetExhausted => "budget_exhausted",
            StopReason::AgentGaveUp => "agent_gave_up",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvidenceEntry {
    pub tool_call: ToolCall,
    pub execution: ToolExecution,
}

pub struct AgentOutcome {
    pub evidence: Vec<EvidenceEntry>,
    pub confidence: u8,
    pub rounds: u32,
    pub stop_reason: StopReason,
}

pub struct IterativeAgent<'a> {
    llm: &'a dyn LlmClient,
    tools: ToolExecutor,
    embedder: Option<Arc<dyn Embedder>>,
    config: &'a AgentConfig,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl<'a> IterativeAgent<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        tools: ToolExecutor,
        embedder: Option<Arc<dyn Embedder>>,
        config: &'a AgentConfig,
        call_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self { llm, tools, embedder, config, call_timeout, cancel }
    }

    pub async fn run(&self, question: &str) -> LlmResult<AgentOutcome> {
        let timeout = self.call_timeout;
        let mut evidence: Vec<EvidenceEntry> = Vec::new();
        let mut memo: HashMap<String, ToolExecution> = HashMap::new();
        let mut round = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            round += 1;

            let user_prompt = build_round_prompt(question, &evidence);
            if self.cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            let raw = self.llm.chat(SYSTEM_PROMPT, &user_prompt, timeout).await?;
            let plan = AgentPlan::parse_defensively(&raw);

            let mut evidence_tokens: usize = evidence.iter().map(|e| estimate_tokens(&e.execution.text)).sum();

            // Independent tool calls within a round run concurrently; the
            // budget gate runs up front against estimated cost, since actual
            // cost is only known after a call completes.
            let mut accepted: Vec<ToolCall> = Vec::new();
            let mut projected_tokens = evidence_tokens;
            for call in &plan.tool_calls {
                let expected_cost = estimate_call_cost(call);
                if projected_tokens + expected_cost > self.config.token_budget {
                    break;
                }
                projected_tokens += expected_cost;
                accepted.push(call.clone());
            }

            let mut to_run: HashMap<String, ToolCall> = HashMap::new();
            for call in &accepted {
                let key = canonicalize(call);
                if !memo.contains_key(&key) {
                    to_run.entry(key).or_insert_with(|| call.clone());
                }
            }

            let mut join_set = tokio::task::JoinSet::new();
            for (key, call) in to_run {
                let tools = self.tools.clone();
                let embedder = self.embedder.clone();
                let cancel = self.cancel.clone();
                join_set.spawn(async move {
                    let execution = tools.execute(&call, embedder.as_deref(), &cancel).await;
                    (key, execution)
                });
            }
            while let Some(joined) = join_set.join_next().await {
                let (key, execution) = joined.expect("tool call task panicked");
                memo.insert(key, execution);
            }

            for call in &accepted {
                let key = canonicalize(call);
                let Some(execution) = memo.get(&key).cloned() else { continue };
                evidence_tokens += estimate_tokens(&execution.text);
                evidence.push(EvidenceEntry { tool_call: call.clone(), execution });
            }

            if plan.confidence >= self.config.confidence_threshold {
                return Ok(AgentOutcome {
                    evidence,
                    confidence: plan.confidence,
                    rounds: round,
                    stop_reason: StopReason::HighConfidence,
                });
            }
            if round >= self.config.max_rounds {
                return Ok(AgentOutcome {
                    evidence,
                    confidence: plan.confidence,
                    rounds: round,
                    stop_reason: StopReason::MaxRounds,
                });
            }
            if evidence_tokens >= self.config.token_budget {
                return Ok(AgentOutcome {
                    evidence,
                    confidence: plan.confidence,
                    rounds: round,
                    stop_reason: StopReason::BudgetExhausted,
                });
            }
            if plan.tool_calls.is_empty() {
                return Ok(AgentOutcome {
                    evidence,
                    confidence: plan.confidence,
                    rounds: round,
                    stop_reason: StopReason::AgentGaveUp,
                });
            }
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a codebase intelligence agent. Reply with JSON only: \
{\"confidence\": 0-100, \"reasoning\": string, \"tool_calls\": [{\"name\": string, \"arguments\": object}]}.";

fn build_round_prompt(question: &str, evidence: &[EvidenceEntry]) -> String {
    let mut prompt = format!("Question: {question}\n\nAvailable tools:{TOOL_SCHEMAS}\n\nEvidence so far:\n");
    if evidence.is_empty() {
        prompt.push_str("(none yet)\n");
    } else {
        for entry in evidence {
            prompt.push_str(&entry.execution.text);
            prompt.push('\n');
        }
    }
    prompt
}

/// Coarse pre-call cost estimate keyed on the call shape, used for budget
/// accounting before a tool actually runs.
fn estimate_call_cost(call: &ToolCall) -> usize {
    match call.name.as_str() {
        "search" => 400,
        "skim" => call
            .arguments
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|a| a.len() * 150)
            .unwrap_or(300),
        "read_file" => 600,
        "expand_neighbors" => 200,
        _ => 100,
    }
}

#[allow(dead_code)]
fn elements_touched(evidence: &[EvidenceEntry]) -> Vec<ElementId> {
    let mut ids = Vec::new();
    for entry in evidence {
        for id in &entry.execution.ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }
    ids
}
