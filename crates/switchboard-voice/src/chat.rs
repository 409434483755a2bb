//! Text-generation client (OpenAI chat-completions API).
//!
//! One request per conversational turn. When the model asks for a function,
//! the orchestrator executes it through its [`crate::FunctionExecutor`] and
//! calls back in with the structured result; this client then appends the
//! tool exchange to the message list so the follow-up reply is grounded in
//! the result.

use crate::config::GenerationConfig;
use crate::error::VoiceError;
use crate::traits::{FunctionCall, GenerationOutcome, GenerationRequest, Responder};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use switchboard_types::TurnRole;

/// Timeout for one generation request.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(9);

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    /// The API ships `null` rather than an empty list when absent.
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    id: String,
    function: ToolFunction,
}

#[derive(Debug, Deserialize)]
struct ToolFunction {
    name: String,
    /// JSON-encoded argument object, as the API ships it.
    #[serde(default)]
    arguments: String,
}

/// Chat-completions text-generation client.
#[derive(Debug, Clone)]
pub struct OpenAiResponder {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl OpenAiResponder {
    pub fn new(config: GenerationConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build generation client: {}", e)))?;
        Ok(Self { config, client })
    }
}

/// Builds the wire message list for a request.
fn build_messages(request: &GenerationRequest) -> Vec<Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": request.instructions,
    })];

    for turn in &request.history {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        messages.push(json!({ "role": role, "content": turn.text }));
    }

    if let Some(exchange) = &request.function_result {
        messages.push(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": exchange.call.id,
                "type": "function",
                "function": {
                    "name": exchange.call.name,
                    "arguments": exchange.call.arguments.to_string(),
                },
            }],
        }));
        messages.push(json!({
            "role": "tool",
            "tool_call_id": exchange.call.id,
            "content": exchange.result.to_string(),
        }));
    }

    messages
}

/// Extracts the outcome from a completion response. A tool call wins over
/// any accompanying content; the content of a plain reply is trimmed.
fn extract_outcome(response: CompletionResponse) -> Result<GenerationOutcome, VoiceError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VoiceError::Generation("response contained no choices".to_string()))?;

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if let Some(tool_call) = tool_calls.into_iter().next() {
        let arguments: Value = serde_json::from_str(&tool_call.function.arguments)
            .unwrap_or_else(|_| json!({}));
        return Ok(GenerationOutcome::FunctionCall(FunctionCall {
            id: tool_call.id,
            name: tool_call.function.name,
            arguments,
        }));
    }

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => {
            Ok(GenerationOutcome::Reply(content.trim().to_string()))
        }
        _ => Err(VoiceError::Generation(
            "response contained neither content nor a tool call".to_string(),
        )),
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn respond(&self, request: GenerationRequest) -> Result<GenerationOutcome, VoiceError> {
        let url = format!("{}/chat/completions", self.config.endpoint);
        let body = json!({
            "model": self.config.model,
            "messages": build_messages(&request),
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Generation(format!("generation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoiceError::Generation(format!(
                "generation request returned {}",
                response.status()
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Generation(format!("unparseable generation response: {}", e)))?;

        extract_outcome(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChatTurn, FunctionExchange};

    fn request_with_history() -> GenerationRequest {
        GenerationRequest {
            instructions: "You are a scheduling assistant.".to_string(),
            history: vec![
                ChatTurn {
                    role: TurnRole::User,
                    text: "hi".to_string(),
                },
                ChatTurn {
                    role: TurnRole::Assistant,
                    text: "hello, how can I help?".to_string(),
                },
                ChatTurn {
                    role: TurnRole::User,
                    text: "book a meeting".to_string(),
                },
            ],
            function_result: None,
        }
    }

    #[test]
    fn messages_start_with_instructions_and_keep_order() {
        let messages = build_messages(&request_with_history());
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are a scheduling assistant.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "book a meeting");
    }

    #[test]
    fn function_result_appends_tool_exchange() {
        let mut request = request_with_history();
        request.function_result = Some(FunctionExchange {
            call: FunctionCall {
                id: "call_1".to_string(),
                name: "book_meeting".to_string(),
                arguments: json!({"day": "tomorrow"}),
            },
            result: json!({"booked": true}),
        });
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[4]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[5]["role"], "tool");
        assert_eq!(messages[5]["tool_call_id"], "call_1");
    }

    #[test]
    fn plain_reply_is_trimmed() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"  Sure, done.  "}}]}"#,
        )
        .unwrap();
        match extract_outcome(response).unwrap() {
            GenerationOutcome::Reply(text) => assert_eq!(text, "Sure, done."),
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[test]
    fn tool_call_wins_over_content() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{
                "content":"let me check",
                "tool_calls":[{"id":"call_9","type":"function",
                    "function":{"name":"lookup","arguments":"{\"q\":\"rooms\"}"}}]
            }}]}"#,
        )
        .unwrap();
        match extract_outcome(response).unwrap() {
            GenerationOutcome::FunctionCall(call) => {
                assert_eq!(call.name, "lookup");
                assert_eq!(call.arguments, json!({"q": "rooms"}));
            }
            other => panic!("expected function call, got {:?}", other),
        }
    }

    #[test]
    fn empty_response_is_an_error() {
        let response: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_outcome(response).is_err());

        let blank: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap();
        assert!(extract_outcome(blank).is_err());
    }
}
