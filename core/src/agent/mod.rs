//! Agent orchestrator: a language model decides which recommendation
//! strategy to invoke.
//!
//! Single-turn and non-interactive: one instruction goes in, the loop runs
//! zero or more tool calls, one narrative comes out. No conversation
//! history is kept across turns.

mod llm;
mod tool;

pub use llm::{ChatMessage, LlmClient, OpenAiClient, Role, DEFAULT_MODEL};
pub use tool::{GenreTool, Tool, ToolRegistry, TopArtistsTool, TopTracksTool};

use crate::models::AgentTurn;
use crate::recommend::{validate_count, MusicApi, RecommendError, Recommender};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Hard bound on reasoning steps for one turn. The expected shape is one
/// tool call plus one answer; anything past this is a runaway loop.
const MAX_STEPS: usize = 4;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("Language model call failed: {0}")]
    Llm(String),
    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),
    #[error("Model asked for unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool {tool} failed: {message}")]
    Tool { tool: String, message: String },
    #[error("No final answer after {0} reasoning steps")]
    StepLimit(usize),
    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

/// Tool invocation requested by the model:
/// `{"tool": "<name>", "args": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone)]
pub enum LlmDecision {
    /// Plain-text final answer for the user.
    Answer(String),
    /// The model wants a tool executed first.
    Call(ToolCall),
}

/// Splits model output into a tool call or a final answer.
///
/// Output starting with a JSON object (optionally fenced) is a tool call;
/// anything else is the answer. A JSON object that does not parse as a
/// tool call is an error rather than an answer, so a garbled call is
/// surfaced instead of being read back to the user.
pub fn parse_llm_output(output: &str) -> Result<LlmDecision, AgentError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        }
    } else if trimmed.starts_with('{') {
        match trimmed.rfind('}') {
            Some(end) => &trimmed[..=end],
            None => trimmed,
        }
    } else {
        return Ok(LlmDecision::Answer(trimmed.to_string()));
    };

    let call: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::MalformedToolCall(format!("{}: {}", e, json_str)))?;

    if call.tool.is_empty() {
        Ok(LlmDecision::Answer(trimmed.to_string()))
    } else {
        Ok(LlmDecision::Call(call))
    }
}

fn system_prompt(tools: &ToolRegistry) -> String {
    let mut lines = vec![
        "You are a music recommendation assistant with access to the listener's Spotify account."
            .to_string(),
        String::new(),
        "Available tools:".to_string(),
    ];
    for (name, description) in tools.tool_descriptions() {
        lines.push(format!("- {}: {}", name, description));
    }
    lines.push(String::new());
    lines.push(
        "To call a tool, reply with a single JSON object and nothing else, e.g. \
         {\"tool\": \"top_tracks_recommendations\", \"args\": {}}."
            .to_string(),
    );
    lines.push(
        "Each tool returns one recommended song per line, formatted as \"Title - Artists\"."
            .to_string(),
    );
    lines.push(
        "Once you have tool results, reply in plain text with a numbered list of exactly \
         as many songs as the listener asked for. If the random genre tool was used, state \
         the chosen genre in your answer."
            .to_string(),
    );
    lines.join("\n")
}

/// Reasoning loop bound to a fixed prompt, a deterministic model, and the
/// three recommendation tools.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    system_prompt: String,
}

/// Wires an [`Agent`] to the env-configured OpenAI client. Fails with
/// [`AgentError::MissingApiKey`] before any remote call when the key is
/// absent.
pub fn build_agent(api: Arc<dyn MusicApi>) -> Result<Agent, AgentError> {
    let llm = Arc::new(OpenAiClient::from_env()?);
    Ok(Agent::new(llm, api))
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, api: Arc<dyn MusicApi>) -> Self {
        let recommender = Arc::new(Recommender::new(api));

        let mut tools = ToolRegistry::new();
        tools.register(TopTracksTool::new(recommender.clone()));
        tools.register(TopArtistsTool::new(recommender.clone()));
        tools.register(GenreTool::new(recommender));

        let system_prompt = system_prompt(&tools);
        Self {
            llm,
            tools,
            system_prompt,
        }
    }

    /// Runs one agent turn.
    ///
    /// A failing tool terminates the run with its error in place of an
    /// answer; there is no re-authentication or recovery mid-run.
    pub async fn run(&self, instruction: &str, count: u32) -> Result<AgentTurn, AgentError> {
        validate_count(count)?;

        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(format!(
                "Create a playlist {} that has {} songs. Number each song in your response. \
                 If a random genre was drawn, tell the listener which genre it was.",
                instruction, count
            )),
        ];
        let mut tools_invoked: Vec<String> = Vec::new();

        for _ in 0..MAX_STEPS {
            let output = self.llm.complete(&messages).await.map_err(AgentError::Llm)?;

            match parse_llm_output(&output)? {
                LlmDecision::Answer(narrative) => {
                    return Ok(AgentTurn {
                        narrative,
                        tools_invoked,
                    });
                }
                LlmDecision::Call(call) => {
                    let tool = self
                        .tools
                        .get(&call.tool)
                        .ok_or_else(|| AgentError::UnknownTool(call.tool.clone()))?;

                    debug!("agent invoking tool {}", call.tool);
                    let observation =
                        tool.execute(call.args.clone())
                            .await
                            .map_err(|message| AgentError::Tool {
                                tool: call.tool.clone(),
                                message,
                            })?;

                    tools_invoked.push(call.tool.clone());
                    messages.push(ChatMessage::assistant(output));
                    messages.push(ChatMessage::user(format!(
                        "Tool {} returned:\n{}",
                        call.tool, observation
                    )));
                }
            }
        }

        Err(AgentError::StepLimit(MAX_STEPS))
    }
}
