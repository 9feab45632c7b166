use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use medenhance_contracts::analysis::{AiAnalysis, AttemptOutcome, ProviderAttempt};
use medenhance_contracts::events::{EventPayload, EventWriter};
use medenhance_contracts::providers::{NamedProvider, ProviderRegistry};
use serde_json::Value;

use super::config::AnalysisConfig;
use super::parse::extract_embedded_json;
use super::prompt::PromptContext;
use super::providers::{default_providers, ProviderReply, SharedProvider};
use crate::error::{error_chain_text, PipelineError, PipelineErrorKind};

const ERROR_DETAIL_CHARS: usize = 512;

enum CallFailure {
    Timeout(String),
    Error(String),
}

/// Ordered provider fallback for the enhancement report. `analyze` never
/// fails: when every provider misses, the degraded analysis is returned.
#[derive(Clone)]
pub struct AnalysisChain {
    providers: ProviderRegistry<SharedProvider>,
    timeout: Duration,
    events: EventWriter,
}

impl AnalysisChain {
    pub fn new(providers: ProviderRegistry<SharedProvider>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            events: EventWriter::disabled(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(default_providers(config), config.timeout)
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = events;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry<SharedProvider> {
        &self.providers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn analyze(&self, context: &PromptContext) -> AiAnalysis {
        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        for provider in self.providers.providers() {
            let name = provider.name().to_string();
            let mut payload = EventPayload::new();
            payload.insert("provider".to_string(), Value::String(name.clone()));
            payload.insert(
                "modality".to_string(),
                Value::String(context.modality.label().to_string()),
            );
            payload.insert(
                "timeout_ms".to_string(),
                Value::from(self.timeout.as_millis() as u64),
            );
            self.events.note("provider_attempt", payload);

            let started = Instant::now();
            let outcome = call_with_timeout(provider, context, self.timeout);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let reply = match outcome {
                Ok(reply) => reply,
                Err(CallFailure::Timeout(detail)) => {
                    let outcome = AttemptOutcome::Timeout;
                    self.record_failure(&mut attempts, &name, outcome, detail, elapsed_ms);
                    continue;
                }
                Err(CallFailure::Error(detail)) => {
                    let outcome = AttemptOutcome::Error;
                    self.record_failure(&mut attempts, &name, outcome, detail, elapsed_ms);
                    continue;
                }
            };

            let text = reply.text.trim().to_string();
            if text.is_empty() {
                self.record_failure(
                    &mut attempts,
                    &name,
                    AttemptOutcome::Empty,
                    "provider returned empty text".to_string(),
                    elapsed_ms,
                );
                continue;
            }
            let structured = extract_embedded_json(&text);
            if context.expect_structured && structured.is_none() {
                self.record_failure(
                    &mut attempts,
                    &name,
                    AttemptOutcome::ParseFailure,
                    "no embedded JSON structure in reply".to_string(),
                    elapsed_ms,
                );
                continue;
            }

            attempts.push(ProviderAttempt {
                provider: name.clone(),
                outcome: AttemptOutcome::Ok,
                detail: None,
                elapsed_ms,
            });
            let mut payload = EventPayload::new();
            payload.insert("provider".to_string(), Value::String(name.clone()));
            payload.insert("elapsed_ms".to_string(), Value::from(elapsed_ms));
            payload.insert("structured".to_string(), Value::Bool(structured.is_some()));
            payload.insert("attempts".to_string(), Value::from(attempts.len() as u64));
            self.events.note("analysis_completed", payload);

            return AiAnalysis {
                provider_name: name,
                raw_text: text,
                structured,
                succeeded: true,
                model: reply.model,
                attempts,
            };
        }

        let mut payload = EventPayload::new();
        payload.insert(
            "modality".to_string(),
            Value::String(context.modality.label().to_string()),
        );
        payload.insert("attempts".to_string(), Value::from(attempts.len() as u64));
        self.events.note("analysis_degraded", payload);
        AiAnalysis::degraded(context.modality, &context.chain_text(), attempts)
    }

    fn record_failure(
        &self,
        attempts: &mut Vec<ProviderAttempt>,
        provider: &str,
        outcome: AttemptOutcome,
        detail: String,
        elapsed_ms: u64,
    ) {
        let mut payload = EventPayload::new();
        payload.insert("provider".to_string(), Value::String(provider.to_string()));
        payload.insert(
            "outcome".to_string(),
            serde_json::to_value(outcome).unwrap_or(Value::Null),
        );
        payload.insert("error".to_string(), Value::String(detail.clone()));
        payload.insert("elapsed_ms".to_string(), Value::from(elapsed_ms));
        self.events.note("provider_failed", payload);
        attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            outcome,
            detail: Some(detail),
            elapsed_ms,
        });
    }
}

/// Runs one provider call on its own thread and waits at most `timeout`.
/// A call that misses the deadline is detached and its reply dropped.
fn call_with_timeout(
    provider: &SharedProvider,
    context: &PromptContext,
    timeout: Duration,
) -> Result<ProviderReply, CallFailure> {
    let (tx, rx) = mpsc::channel();
    let worker_provider = SharedProvider::clone(provider);
    let worker_context = context.clone();
    let spawned = thread::Builder::new()
        .name(format!("analysis-{}", provider.name()))
        .spawn(move || {
            let _ = tx.send(worker_provider.try_analyze(&worker_context, timeout));
        });
    if let Err(err) = spawned {
        return Err(CallFailure::Error(format!(
            "failed to start provider worker: {err}"
        )));
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(err)) => {
            let detail = error_chain_text(&err, ERROR_DETAIL_CHARS);
            if PipelineError::kind_of(&err) == Some(PipelineErrorKind::ProviderTimeout) {
                Err(CallFailure::Timeout(detail))
            } else {
                Err(CallFailure::Error(detail))
            }
        }
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CallFailure::Timeout(format!(
            "{} did not answer within {} ms",
            provider.name(),
            timeout.as_millis()
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CallFailure::Error(format!(
            "{} worker exited without a reply",
            provider.name()
        ))),
    }
}
