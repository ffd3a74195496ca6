//! Keep-alive dispatch: one batch of models for one account.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cockpit_types::{DispatchError, ScheduleError, TokenUsage, TriggerRecord, TriggerSource};
use tokio::task::JoinSet;

use super::clock::Clock;
use super::collaborators::{require_token, KeepAliveReply, KeepAliveRequest, KeepAliveTransport, TokenProvider};
use crate::error::AppResult;

/// Upper bound on concurrent requests per batch.
pub const MAX_CONCURRENCY: usize = 4;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PROMPT: &str = "hi";
/// Replies longer than this are cut in history lines.
const MAX_REPLY_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub models: Vec<String>,
    pub prompt: Option<String>,
    pub account_email: String,
    pub max_output_tokens: Option<u32>,
    pub source: TriggerSource,
}

#[derive(Debug)]
struct ModelOutcome {
    model: String,
    latency_ms: u64,
    result: Result<KeepAliveReply, DispatchError>,
}

pub struct KeepAliveDispatcher {
    transport: Arc<dyn KeepAliveTransport>,
    tokens: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl KeepAliveDispatcher {
    pub fn new(
        transport: Arc<dyn KeepAliveTransport>,
        tokens: Arc<dyn TokenProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { transport, tokens, clock, timeout: REQUEST_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send the prompt to every model with at most [`MAX_CONCURRENCY`] in
    /// flight. Per-model failures land in the record; only a missing token
    /// or an empty model list is an error.
    pub async fn dispatch(&self, request: DispatchRequest) -> AppResult<TriggerRecord> {
        if request.models.is_empty() {
            return Err(ScheduleError::NoModelsSelected.into());
        }
        let (token, project_id) = require_token(self.tokens.as_ref(), &request.account_email).await?;

        let prompt = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROMPT)
            .to_string();
        let timestamp = self.clock.now_ms();
        let started = Instant::now();

        tracing::info!(
            email = %request.account_email,
            "[Dispatcher] Sending keep-alive to {} model(s): {}",
            request.models.len(),
            request.models.join(", ")
        );

        let models: Arc<[String]> = request.models.clone().into();
        let token: Arc<str> = token.into();
        let project_id: Option<Arc<str>> = project_id.map(Into::into);
        let prompt_shared: Arc<str> = prompt.as_str().into();
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = MAX_CONCURRENCY.min(models.len());

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let models = Arc::clone(&models);
            let cursor = Arc::clone(&cursor);
            let transport = Arc::clone(&self.transport);
            let token = Arc::clone(&token);
            let project_id = project_id.clone();
            let prompt = Arc::clone(&prompt_shared);
            let max_output_tokens = request.max_output_tokens;
            let timeout = self.timeout;

            set.spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let idx = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(model) = models.get(idx) else { break };
                    let sent = Instant::now();
                    let send = transport.send_keep_alive(KeepAliveRequest {
                        access_token: &token,
                        project_id: project_id.as_deref(),
                        model,
                        prompt: &prompt,
                        max_output_tokens,
                        timeout,
                    });
                    let result = match tokio::time::timeout(timeout, send).await {
                        Ok(result) => result,
                        Err(_) => Err(DispatchError::Timeout {
                            model: model.clone(),
                            duration_secs: timeout.as_secs(),
                        }),
                    };
                    outcomes.push((
                        idx,
                        ModelOutcome {
                            model: model.clone(),
                            latency_ms: sent.elapsed().as_millis() as u64,
                            result,
                        },
                    ));
                }
                outcomes
            });
        }

        let mut outcomes: Vec<(usize, ModelOutcome)> = Vec::with_capacity(models.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(batch) => outcomes.extend(batch),
                Err(e) => tracing::error!("[Dispatcher] Worker task failed: {}", e),
            }
        }
        outcomes.sort_by_key(|(idx, _)| *idx);
        let outcomes: Vec<ModelOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

        let record = build_record(
            &request,
            &prompt,
            timestamp,
            started.elapsed().as_millis() as u64,
            &outcomes,
        );
        if record.success {
            tracing::info!(email = %request.account_email, "[Dispatcher] Batch done in {}ms", record.duration_ms);
        } else {
            tracing::warn!(email = %request.account_email, "[Dispatcher] Every model failed:\n{}", record.message);
        }
        Ok(record)
    }
}

fn short_reply(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match single_line.char_indices().nth(MAX_REPLY_CHARS) {
        Some((idx, _)) => format!("{}...", &single_line[..idx]),
        None => single_line,
    }
}

fn build_record(
    request: &DispatchRequest,
    prompt: &str,
    timestamp: i64,
    duration_ms: u64,
    outcomes: &[ModelOutcome],
) -> TriggerRecord {
    let mut success_lines = Vec::new();
    let mut failure_lines = Vec::new();
    let mut usage: Option<TokenUsage> = None;

    for outcome in outcomes {
        match &outcome.result {
            Ok(reply) => {
                let tokens = match &reply.usage {
                    Some(u) => {
                        usage.get_or_insert_with(TokenUsage::default).accumulate(u);
                        format!(", {}+{}={} tokens", u.prompt_tokens, u.completion_tokens, u.total_tokens)
                    },
                    None => String::new(),
                };
                success_lines.push(format!(
                    "✅ {} ({}ms{}): {}",
                    outcome.model,
                    outcome.latency_ms,
                    tokens,
                    short_reply(&reply.reply_text)
                ));
            },
            Err(e) => {
                failure_lines.push(format!("❌ {} ({}ms): {}", outcome.model, outcome.latency_ms, e));
            },
        }
    }

    let success = !success_lines.is_empty();
    success_lines.extend(failure_lines);

    TriggerRecord {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        success,
        prompt: format!("[{}] {}", request.models.join(", "), prompt),
        message: success_lines.join("\n"),
        duration_ms,
        token_usage: usage,
        trigger_type: request.source.trigger_type(),
        trigger_source: request.source,
        account_email: Some(request.account_email.clone()),
    }
}
