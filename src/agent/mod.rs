//! The iterative retrieval agent: tool executor, iterative tool-call loop,
//! and answer generator. Tool-call input and output are always parsed
//! through strict typed structs, never matched loosely against raw JSON.

pub mod answer;
pub mod iterative;
pub mod tools;

pub use answer::AnswerGenerator;
pub use iterative::{AgentOutcome, IterativeAgent, StopReason};
pub use tools::{PublishedState, ToolExecution, ToolExecutor};
