//! Answer Generator — one LLM call over accumulated evidence, with
//! lowest-scoring-first context eviction to stay under budget. No tool calls
//! permitted here.

use std::time::Duration;

use crate::agent::iterative::EvidenceEntry;
use crate::agent::tools::estimate_tokens;
use crate::error::LlmResult;
use crate::llm::LlmClient;

const SYSTEM_PROMPT: &str =
    "You are a codebase intelligence assistant. Answer the question in markdown using only the \
     evidence provided. Do not invent APIs or behavior not shown in the evidence.";

pub struct AnswerGenerator<'a> {
    llm: &'a dyn LlmClient,
    context_budget: usize,
    call_timeout: Duration,
}

impl<'a> AnswerGenerator<'a> {
    pub fn new(llm: &'a dyn LlmClient, context_budget: usize, call_timeout: Duration) -> Self {
        Self { llm, context_budget, call_timeout }
    }

    pub async fn generate(&self, question: &str, evidence: &[EvidenceEntry]) -> LlmResult<String> {
        let kept = evict_to_budget(evidence, self.context_budget);
        let prompt = build_prompt(question, &kept);
        self.llm.chat(SYSTEM_PROMPT, &prompt, self.call_timeout).await
    }
}

/// Drops lowest-`relevance` entries first until the total estimated token
/// count is within `budget`.
fn evict_to_budget<'a>(evidence: &'a [EvidenceEntry], budget: usize) -> Vec<&'a EvidenceEntry> {
    let mut ranked: Vec<&EvidenceEntry> = evidence.iter().collect();
    ranked.sort_by(|a, b| {
        b.execution
            .relevance
            .partial_cmp(&a.execution.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept = Vec::new();
    let mut total = 0usize;
    for entry in ranked {
        let cost = estimate_tokens(&entry.execution.text);
        if total + cost > budget && !kept.is_empty() {
            continue;
        }
        total += cost;
        kept.push(entry);
    }
    kept
}

fn build_prompt(question: &str, evidence: &[&EvidenceEntry]) -> String {
    let mut prompt = format!("Question: {question}\n\nEvidence:\n");
    for entry in evidence {
        prompt.push_str(&entry.execution.text);
        prompt.push_str("\n---\n");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::ToolExecution;
    use crate::llm::ToolCall;
    use serde_json::json;

    fn entry(text: &str, relevance: f32) -> EvidenceEntry {
        EvidenceEntry {
            tool_call: ToolCall { name: "search".to_string(), arguments: json!({}) },
            execution: ToolExecution { ids: Vec::new(), text: text.to_string(), relevance },
        }
    }

    #[test]
    fn eviction_keeps_highest_relevance_first() {
        let low = entry(&"x".repeat(4000), 0.1);
        let high = entry(&"y".repeat(4000), 0.9);
        let kept = evict_to_budget(&[low, high], 1100);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].execution.relevance - 0.9).abs() < f32::EPSILON);
    }
}
