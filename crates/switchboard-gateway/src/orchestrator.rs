//! Response orchestration for one finalized utterance.
//!
//! Builds the generation request from the agent's instructions, the bounded
//! conversation history, and the new utterance; runs the (at most two-pass)
//! generation exchange; records both sides of the turn; and publishes them
//! to the transcript bus. The reply text is returned for playback.

use std::sync::Arc;
use switchboard_bus::TranscriptBus;
use switchboard_registry::CallRegistry;
use switchboard_types::{AgentProfile, TranscriptEvent, TurnRole};
use switchboard_voice::{
    ChatTurn, FunctionExchange, FunctionExecutor, GenerationOutcome, GenerationRequest, Responder,
};

/// Spoken when the generation collaborator fails or times out. A live call
/// must never go silent.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble answering right now. Could you say that again?";

/// Drives one generation turn per finalized utterance.
#[derive(Clone)]
pub struct ResponseOrchestrator {
    pub registry: CallRegistry,
    pub bus: TranscriptBus,
    pub responder: Arc<dyn Responder>,
    pub functions: Arc<dyn FunctionExecutor>,
}

impl ResponseOrchestrator {
    /// Produces the reply for `utterance`, with all bookkeeping applied:
    /// both turns appended to the registry and published on the bus.
    ///
    /// Never fails: collaborator errors degrade to [`FALLBACK_REPLY`].
    pub async fn respond(&self, agent: &AgentProfile, call_id: &str, utterance: &str) -> String {
        let reply = match self.generate(agent, call_id, utterance).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(call_id, agent_id = %agent.id, "generation failed: {}", e);
                FALLBACK_REPLY.to_string()
            }
        };

        self.registry.append_turn(call_id, TurnRole::User, utterance);
        self.registry
            .append_turn(call_id, TurnRole::Assistant, &reply);

        self.bus.publish(
            call_id,
            TranscriptEvent::Transcript {
                role: TurnRole::User,
                text: utterance.to_string(),
                is_final: true,
            },
        );
        self.bus.publish(
            call_id,
            TranscriptEvent::Transcript {
                role: TurnRole::Assistant,
                text: reply.clone(),
                is_final: true,
            },
        );

        reply
    }

    async fn generate(
        &self,
        agent: &AgentProfile,
        call_id: &str,
        utterance: &str,
    ) -> Result<String, switchboard_voice::VoiceError> {
        let mut history: Vec<ChatTurn> = self
            .registry
            .conversation(call_id)
            .into_iter()
            .map(|entry| ChatTurn {
                role: entry.role,
                text: entry.text,
            })
            .collect();
        history.push(ChatTurn {
            role: TurnRole::User,
            text: utterance.to_string(),
        });

        let request = GenerationRequest {
            instructions: agent.instructions.clone(),
            history: history.clone(),
            function_result: None,
        };

        match self.responder.respond(request).await? {
            GenerationOutcome::Reply(reply) => Ok(reply),
            GenerationOutcome::FunctionCall(call) => {
                tracing::info!(call_id, function = %call.name, "executing requested function");
                let result = self.functions.execute(&call).await?;
                let follow_up = GenerationRequest {
                    instructions: agent.instructions.clone(),
                    history,
                    function_result: Some(FunctionExchange { call, result }),
                };
                match self.responder.respond(follow_up).await? {
                    GenerationOutcome::Reply(reply) => Ok(reply),
                    GenerationOutcome::FunctionCall(call) => {
                        // One function round trip per utterance; a second
                        // request is treated as a failed turn.
                        Err(switchboard_voice::VoiceError::Generation(format!(
                            "model requested a second function '{}' in one turn",
                            call.name
                        )))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use switchboard_voice::{FunctionCall, VoiceError};

    fn agent() -> AgentProfile {
        AgentProfile {
            id: "agent-1".to_string(),
            name: "Scheduler".to_string(),
            instructions: "You schedule meetings.".to_string(),
            voice_id: None,
            greeting: None,
            phone_number: None,
        }
    }

    /// Responder that replays scripted outcomes and records its requests.
    struct ScriptedResponder {
        outcomes: Mutex<Vec<Result<GenerationOutcome, VoiceError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedResponder {
        fn new(outcomes: Vec<Result<GenerationOutcome, VoiceError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Responder for ScriptedResponder {
        async fn respond(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationOutcome, VoiceError> {
            self.requests.lock().unwrap().push(request);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(VoiceError::Generation("script exhausted".to_string()));
            }
            outcomes.remove(0)
        }
    }

    struct RecordingExecutor {
        calls: Mutex<Vec<FunctionCall>>,
    }

    #[async_trait]
    impl FunctionExecutor for RecordingExecutor {
        async fn execute(&self, call: &FunctionCall) -> Result<serde_json::Value, VoiceError> {
            self.calls.lock().unwrap().push(call.clone());
            Ok(serde_json::json!({"booked": true}))
        }
    }

    fn orchestrator(
        responder: Arc<ScriptedResponder>,
        executor: Arc<RecordingExecutor>,
    ) -> ResponseOrchestrator {
        ResponseOrchestrator {
            registry: CallRegistry::new(),
            bus: TranscriptBus::new(),
            responder,
            functions: executor,
        }
    }

    #[tokio::test]
    async fn reply_is_recorded_and_published() {
        let responder = Arc::new(ScriptedResponder::new(vec![Ok(GenerationOutcome::Reply(
            "Tuesday works.".to_string(),
        ))]));
        let executor = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(responder.clone(), executor);

        let mut sub = orchestrator.bus.subscribe("CA1");
        let reply = orchestrator.respond(&agent(), "CA1", "does Tuesday work").await;

        assert_eq!(reply, "Tuesday works.");
        let log = orchestrator.registry.conversation("CA1");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, TurnRole::User);
        assert_eq!(log[0].text, "does Tuesday work");
        assert_eq!(log[1].role, TurnRole::Assistant);
        assert_eq!(log[1].text, "Tuesday works.");

        assert_eq!(
            sub.recv().await,
            Some(TranscriptEvent::Transcript {
                role: TurnRole::User,
                text: "does Tuesday work".to_string(),
                is_final: true,
            })
        );
        assert_eq!(
            sub.recv().await,
            Some(TranscriptEvent::Transcript {
                role: TurnRole::Assistant,
                text: "Tuesday works.".to_string(),
                is_final: true,
            })
        );
    }

    #[tokio::test]
    async fn request_carries_instructions_history_and_utterance() {
        let responder = Arc::new(ScriptedResponder::new(vec![Ok(GenerationOutcome::Reply(
            "ok".to_string(),
        ))]));
        let executor = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(responder.clone(), executor);
        orchestrator
            .registry
            .append_turn("CA1", TurnRole::User, "earlier question");
        orchestrator
            .registry
            .append_turn("CA1", TurnRole::Assistant, "earlier answer");

        orchestrator.respond(&agent(), "CA1", "new question").await;

        let requests = responder.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.instructions, "You schedule meetings.");
        assert_eq!(request.history.len(), 3);
        assert_eq!(request.history[0].text, "earlier question");
        assert_eq!(request.history[2].text, "new question");
        assert_eq!(request.history[2].role, TurnRole::User);
    }

    #[tokio::test]
    async fn function_call_round_trip_feeds_result_into_second_pass() {
        let responder = Arc::new(ScriptedResponder::new(vec![
            Ok(GenerationOutcome::FunctionCall(FunctionCall {
                id: "call_1".to_string(),
                name: "book_meeting".to_string(),
                arguments: serde_json::json!({"day": "tuesday"}),
            })),
            Ok(GenerationOutcome::Reply("Booked for Tuesday.".to_string())),
        ]));
        let executor = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(responder.clone(), executor.clone());

        let reply = orchestrator.respond(&agent(), "CA1", "book it").await;
        assert_eq!(reply, "Booked for Tuesday.");

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "book_meeting");

        let requests = responder.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let exchange = requests[1].function_result.as_ref().expect("tool exchange");
        assert_eq!(exchange.call.id, "call_1");
        assert_eq!(exchange.result, serde_json::json!({"booked": true}));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_fallback_reply() {
        let responder = Arc::new(ScriptedResponder::new(vec![Err(VoiceError::Generation(
            "provider down".to_string(),
        ))]));
        let executor = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(responder, executor);

        let reply = orchestrator.respond(&agent(), "CA1", "hello").await;
        assert_eq!(reply, FALLBACK_REPLY);

        // The turn is still recorded; the call does not go silent or blank.
        let log = orchestrator.registry.conversation("CA1");
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn second_function_request_in_one_turn_is_a_failed_turn() {
        let function = |id: &str| {
            Ok(GenerationOutcome::FunctionCall(FunctionCall {
                id: id.to_string(),
                name: "loop_forever".to_string(),
                arguments: serde_json::json!({}),
            }))
        };
        let responder = Arc::new(ScriptedResponder::new(vec![function("c1"), function("c2")]));
        let executor = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(responder, executor);

        let reply = orchestrator.respond(&agent(), "CA1", "hello").await;
        assert_eq!(reply, FALLBACK_REPLY);
    }
}
