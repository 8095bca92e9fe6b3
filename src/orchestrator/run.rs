use crate::gateway::ToolGateway;
use crate::llm::{LanguageModel, ModelRequest, ModelStep};
use sqlito_schema::anthropic::MessageRole;
use sqlito_schema::{ChatEvent, ContentBlock, MessageParam, ToolCallRecord};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model stopped asking for tools, or the step budget ran out.
    Finished { steps: u32, tool_calls: u32 },
    /// A provider failure ended the run after an in-stream `error` record.
    Errored { steps: u32 },
    /// The client went away or the token was cancelled.
    Cancelled { steps: u32 },
}

/// A validated chat request bound to an open tool gateway.
pub struct PreparedRun {
    gateway: Box<dyn ToolGateway>,
    model: Arc<dyn LanguageModel>,
    api_key: String,
    system: String,
    transcript: Vec<MessageParam>,
    max_steps: u32,
}

enum Flow {
    Continue,
    Stop(RunOutcome),
}

impl PreparedRun {
    pub(super) fn new(
        gateway: Box<dyn ToolGateway>,
        model: Arc<dyn LanguageModel>,
        api_key: String,
        system: String,
        transcript: Vec<MessageParam>,
        max_steps: u32,
    ) -> Self {
        Self {
            gateway,
            model,
            api_key,
            system,
            transcript,
            max_steps: max_steps.max(1),
        }
    }

    /// Drive the conversation, sending events to `sink` in order.
    ///
    /// The gateway is closed exactly once before this returns, whatever the outcome.
    pub async fn run(mut self, sink: mpsc::Sender<ChatEvent>, cancel: CancellationToken) -> RunOutcome {
        let outcome = self.drive(&sink, &cancel).await;
        self.gateway.close().await;

        match &outcome {
            RunOutcome::Finished { steps, tool_calls } => {
                info!(steps, tool_calls, "Chat run finished")
            }
            RunOutcome::Errored { steps } => warn!(steps, "Chat run ended with a provider error"),
            RunOutcome::Cancelled { steps } => info!(steps, "Chat run cancelled"),
        }
        outcome
    }

    async fn drive(&mut self, sink: &mpsc::Sender<ChatEvent>, cancel: &CancellationToken) -> RunOutcome {
        let tools = self.gateway.list_tools();
        let mut step: u32 = 0;
        let mut tool_call_count: u32 = 0;

        loop {
            if sink.is_closed() {
                cancel.cancel();
            }
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled { steps: step };
            }

            let request = ModelRequest {
                api_key: self.api_key.clone(),
                system: self.system.clone(),
                messages: self.transcript.clone(),
                tools: tools.clone(),
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RunOutcome::Cancelled { steps: step },
                _ = sink.closed() => {
                    cancel.cancel();
                    return RunOutcome::Cancelled { steps: step };
                }
                result = self.model.step(&request) => result,
            };

            let model_step = match result {
                Ok(model_step) => model_step,
                Err(e) => {
                    warn!(step = step + 1, error = %e, "Model step failed");
                    let event = ChatEvent::Error {
                        error: e.client_message(),
                    };
                    if !emit(sink, cancel, event).await {
                        return RunOutcome::Cancelled { steps: step };
                    }
                    return RunOutcome::Errored { steps: step };
                }
            };
            step += 1;
            tool_call_count += model_step.tool_calls.len() as u32;

            match self.finish_step(step, model_step, sink, cancel).await {
                Flow::Continue => {}
                Flow::Stop(outcome) => return outcome,
            }

            if step >= self.max_steps {
                debug!(step, "Step budget exhausted");
                break;
            }
            if !self.wants_another_step() {
                break;
            }
        }

        let summary = ChatEvent::ConversationSummary {
            step_count: step,
            tool_call_count,
            completed: true,
        };
        if !emit(sink, cancel, summary).await {
            return RunOutcome::Cancelled { steps: step };
        }
        RunOutcome::Finished {
            steps: step,
            tool_calls: tool_call_count,
        }
    }

    /// Emit the events of one completed model step and run its tool calls.
    ///
    /// On success the assistant turn (and, with tools, the tool results turn) is appended to the
    /// transcript.
    async fn finish_step(
        &mut self,
        step: u32,
        model_step: ModelStep,
        sink: &mpsc::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> Flow {
        let cancelled = Flow::Stop(RunOutcome::Cancelled { steps: step });
        let ModelStep {
            text,
            tool_calls,
            finish_reason,
        } = model_step;
        let finish_reason = finish_reason.as_str().to_string();

        if !text.is_empty() {
            let event = ChatEvent::TextUpdate {
                content: text.clone(),
                step_number: step,
            };
            if !emit(sink, cancel, event).await {
                return cancelled;
            }
        }

        let mut records = Vec::with_capacity(tool_calls.len());
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in &tool_calls {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled,
                outcome = self.gateway.invoke(&call.name, &call.input) => outcome,
            };
            debug!(
                step,
                tool = %call.name,
                is_error = outcome.is_error,
                result_chars = outcome.text.len(),
                "Tool call completed"
            );
            results.push(ContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                content: outcome.text.clone(),
                is_error: outcome.is_error,
            });
            records.push(ToolCallRecord {
                tool_name: call.name.clone(),
                args: call.input.clone(),
                result: outcome.text,
                is_error: outcome.is_error,
            });
        }

        let tools_used: Vec<String> = tool_calls.iter().map(|c| c.name.clone()).collect();
        if !records.is_empty() {
            let event = ChatEvent::ToolExecution {
                step_number: step,
                tool_calls: records,
                finish_reason: finish_reason.clone(),
            };
            if !emit(sink, cancel, event).await {
                return cancelled;
            }
        }

        let progress = ChatEvent::StepProgress {
            step_number: step,
            step_type: if step == 1 { "initial" } else { "tool-result" }.to_string(),
            has_tool_calls: !tool_calls.is_empty(),
            tools_used,
            finish_reason,
        };
        if !emit(sink, cancel, progress).await {
            return cancelled;
        }

        let mut assistant = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            assistant.push(ContentBlock::Text { text });
        }
        assistant.extend(tool_calls.into_iter().map(|c| ContentBlock::ToolUse {
            id: c.id,
            name: c.name,
            input: c.input,
        }));
        if !assistant.is_empty() {
            self.transcript.push(MessageParam {
                role: MessageRole::Assistant,
                content: assistant,
            });
        }
        if !results.is_empty() {
            self.transcript.push(MessageParam {
                role: MessageRole::User,
                content: results,
            });
        }
        Flow::Continue
    }

    /// Another step is only useful when the last turn handed tool results back to the model.
    fn wants_another_step(&self) -> bool {
        self.transcript.last().is_some_and(|turn| {
            turn.role == MessageRole::User
                && turn
                    .content
                    .iter()
                    .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
        })
    }
}

/// Send one event, giving up when the run is cancelled or the receiver is gone.
async fn emit(sink: &mpsc::Sender<ChatEvent>, cancel: &CancellationToken, event: ChatEvent) -> bool {
    let kind = event.kind();
    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        res = sink.send(event) => res.is_ok(),
    };
    if !sent {
        debug!(event = kind, "Event receiver gone; cancelling run");
        cancel.cancel();
    }
    sent
}
