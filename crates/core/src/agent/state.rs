use std::sync::Arc;

use scout_model::ModelMessage;

use super::{Agent, AskError};
use crate::conversation::{Conversation, Turn};
use crate::model_client::{GenerateError, GeneratedTurn, ModelTurn};
use crate::tool::{ToolObservation, ToolRequest};

pub enum AgentStage {
    Thinking,
    Dispatching(ToolRequest),
    Observing(ToolObservation),
    Done(Result<String, AskError>),
}

/// One question being worked on.
pub struct Run<'a> {
    agent: &'a Agent,
    conversation: Conversation,
    steps: usize,
    parse_failures: usize,
}

impl<'a> Run<'a> {
    pub fn new(agent: &'a Agent, conversation: Conversation) -> Self {
        Self {
            agent,
            conversation,
            steps: 0,
            parse_failures: 0,
        }
    }

    pub async fn run(mut self) -> (Conversation, Result<String, AskError>) {
        let mut stage = AgentStage::Thinking;
        loop {
            stage = match stage {
                AgentStage::Thinking => self.think().await,
                AgentStage::Dispatching(req) => self.dispatch(req).await,
                AgentStage::Observing(observation) => self.observe(observation),
                AgentStage::Done(outcome) => {
                    return (self.conversation, outcome);
                }
            };
        }
    }

    async fn think(&mut self) -> AgentStage {
        let max_steps = self.agent.max_steps;
        if self.steps >= max_steps {
            warn!("step budget of {max_steps} spent without a final answer");
            return AgentStage::Done(Err(AskError::StepBudgetExceeded {
                max_steps,
            }));
        }
        self.steps += 1;
        debug!("thinking (step {}/{max_steps})", self.steps);

        let on_transcript = match &self.agent.on_transcript {
            Some(on_transcript) => Arc::clone(on_transcript),
            None => Arc::new(|_: &str| {}),
        };
        let generated = self
            .agent
            .model_client
            .generate(
                &self.conversation,
                &self.agent.catalog,
                self.conversation.len(),
                on_transcript,
            )
            .await;

        match generated {
            Ok(GeneratedTurn {
                turn: ModelTurn::FinalAnswer(answer),
                message,
            }) => {
                self.conversation
                    .push(Turn::AssistantText(answer.clone()), message);
                AgentStage::Done(Ok(answer))
            }
            Ok(GeneratedTurn {
                turn: ModelTurn::ToolCall(req),
                message,
            }) => {
                self.conversation
                    .push(Turn::ToolRequest(req.clone()), message);
                AgentStage::Dispatching(req)
            }
            Err(GenerateError::Parse(err)) => {
                if self.parse_failures >= self.agent.parse_retries {
                    error!("giving up on malformed reply: {}", err.reason);
                    return AgentStage::Done(Err(AskError::Parse(err)));
                }
                self.parse_failures += 1;
                warn!("malformed reply, asking again: {}", err.reason);

                if !err.raw.trim().is_empty() {
                    self.conversation.push(
                        Turn::AssistantText(err.raw.clone()),
                        ModelMessage::Assistant(err.raw.clone()),
                    );
                }
                let style = self.agent.model_client.style();
                let note = style.correction_note(&err);
                self.conversation
                    .push(Turn::User(note.clone()), ModelMessage::User(note));
                AgentStage::Thinking
            }
            Err(GenerateError::Provider(err)) => {
                AgentStage::Done(Err(AskError::Model(err)))
            }
            Err(GenerateError::EmptyConversation) => {
                AgentStage::Done(Err(AskError::EmptyQuestion))
            }
        }
    }

    async fn dispatch(&mut self, req: ToolRequest) -> AgentStage {
        if let Some(on_tool_call) = &self.agent.on_tool_call {
            on_tool_call(&req);
        }
        let observation = self.agent.tool_executor.dispatch(&req).await;
        AgentStage::Observing(observation)
    }

    fn observe(&mut self, observation: ToolObservation) -> AgentStage {
        if !observation.succeeded {
            let name = &observation.tool_name;
            debug!("tool {name} failed: {}", observation.result);
        }
        if let Some(on_observation) = &self.agent.on_observation {
            on_observation(&observation);
        }
        let msg = self
            .agent
            .model_client
            .style()
            .observation_message(&observation);
        self.conversation
            .push(Turn::ToolObservation(observation), msg);
        AgentStage::Thinking
    }
}
