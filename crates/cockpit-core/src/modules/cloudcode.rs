//! Cloud Code (`cloudcode-pa`) client: model catalog with quota, and keep-alive prompts.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use cockpit_types::{DispatchError, TokenUsage};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::ModelQuotaSnapshot;
use crate::trigger::{KeepAliveReply, KeepAliveRequest, KeepAliveTransport, ModelCatalogSource};
use crate::utils::http::{create_client, DEFAULT_TIMEOUT_SECS};

pub const CLOUD_CODE_BASE_URL: &str = "https://cloudcode-pa.googleapis.com";
const USER_AGENT: &str = concat!("antigravity/1.11.5 cockpit/", env!("CARGO_PKG_VERSION"));
/// Upstream error bodies are cut to this many characters in messages.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Deserialize)]
struct AvailableModelsResponse {
    #[serde(default)]
    models: BTreeMap<String, ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    display_name: Option<String>,
    model: Option<String>,
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaInfo {
    remaining_fraction: Option<f64>,
    reset_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoadProjectResponse {
    #[serde(rename = "cloudaicompanionProject")]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(u: UsageMetadata) -> Self {
        let total = if u.total_token_count > 0 {
            u.total_token_count
        } else {
            u.prompt_token_count + u.candidates_token_count
        };
        Self {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: total,
        }
    }
}

pub struct CloudCodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl CloudCodeClient {
    pub fn new() -> AppResult<Self> {
        Self::with_base_url(CLOUD_CODE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> AppResult<Self> {
        let client = create_client(DEFAULT_TIMEOUT_SECS).map_err(AppError::Unknown)?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1internal:{}", self.base_url, method)
    }

    /// Resolve the companion project of the token's account. Failures only log.
    pub async fn load_project_id(&self, access_token: &str) -> Option<String> {
        let meta = json!({"metadata": {"ideType": "ANTIGRAVITY"}});
        let res = self
            .client
            .post(self.endpoint("loadCodeAssist"))
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&meta)
            .send()
            .await;

        match res {
            Ok(res) if res.status().is_success() => match res.json::<LoadProjectResponse>().await {
                Ok(data) => data.project_id,
                Err(e) => {
                    tracing::warn!("[CloudCode] loadCodeAssist parse error: {}", e);
                    None
                },
            },
            Ok(res) => {
                tracing::warn!("[CloudCode] loadCodeAssist failed: Status: {}", res.status());
                None
            },
            Err(e) => {
                tracing::error!("[CloudCode] loadCodeAssist network error: {}", e);
                None
            },
        }
    }

    async fn resolve_project(&self, access_token: &str, project_id: Option<&str>) -> Option<String> {
        match project_id {
            Some(p) if !p.is_empty() => Some(p.to_string()),
            _ => self.load_project_id(access_token).await,
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn parse_catalog(
    response: AvailableModelsResponse,
    filter_ids: Option<&[String]>,
) -> Vec<ModelQuotaSnapshot> {
    response
        .models
        .into_iter()
        .map(|(id, info)| {
            let (remaining_fraction, reset_time) = match info.quota_info {
                // An exhausted model reports only its reset time.
                Some(q) => {
                    let fraction = q.remaining_fraction.or(q.reset_time.as_ref().map(|_| 0.0));
                    (fraction, q.reset_time)
                },
                None => (None, None),
            };
            ModelQuotaSnapshot {
                id,
                model_constant: info.model,
                display_name: info.display_name,
                remaining_fraction,
                reset_time,
            }
        })
        .filter(|m| filter_ids.map_or(true, |ids| ids.iter().any(|id| m.matches(id))))
        .collect()
}

/// Reply text and usage from a generateContent body, wrapped in `response` or not.
fn parse_reply(body: &Value) -> Result<KeepAliveReply, DispatchError> {
    let inner = body.get("response").unwrap_or(body);
    let candidates = inner.get("candidates").and_then(Value::as_array).ok_or_else(|| {
        DispatchError::InvalidResponse { message: "missing candidates".to_string() }
    })?;

    let reply_text: String = candidates
        .first()
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let usage = inner
        .get("usageMetadata")
        .cloned()
        .and_then(|u| serde_json::from_value::<UsageMetadata>(u).ok())
        .map(TokenUsage::from);

    Ok(KeepAliveReply { reply_text: reply_text.trim().to_string(), usage })
}

fn transport_error(e: &reqwest::Error, model: &str, timeout: Duration) -> DispatchError {
    if e.is_timeout() {
        DispatchError::Timeout { model: model.to_string(), duration_secs: timeout.as_secs() }
    } else {
        DispatchError::Transport { message: e.to_string() }
    }
}

#[async_trait]
impl ModelCatalogSource for CloudCodeClient {
    async fn fetch_model_catalog(
        &self,
        access_token: &str,
        project_id: Option<&str>,
        filter_ids: Option<&[String]>,
    ) -> AppResult<Vec<ModelQuotaSnapshot>> {
        let project = self.resolve_project(access_token, project_id).await;
        let payload = match &project {
            Some(p) => json!({"project": p}),
            None => json!({}),
        };

        let response = self
            .client
            .post(self.endpoint("fetchAvailableModels"))
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError::Upstream {
                status: status.as_u16(),
                message: truncate(&text, MAX_ERROR_BODY),
            }
            .into());
        }

        let body: AvailableModelsResponse = response.json().await?;
        Ok(parse_catalog(body, filter_ids))
    }
}

#[async_trait]
impl KeepAliveTransport for CloudCodeClient {
    async fn send_keep_alive(
        &self,
        request: KeepAliveRequest<'_>,
    ) -> Result<KeepAliveReply, DispatchError> {
        let project = self.resolve_project(request.access_token, request.project_id).await;

        let mut generation_config = json!({});
        if let Some(max) = request.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max);
        }
        let mut body = json!({
            "model": request.model,
            "userAgent": "antigravity",
            "requestId": format!("cockpit-{}", uuid::Uuid::new_v4()),
            "request": {
                "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
                "generationConfig": generation_config,
            },
        });
        if let Some(project) = project {
            body["project"] = json!(project);
        }

        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .bearer_auth(request.access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, request.model, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError::Upstream {
                status: status.as_u16(),
                message: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| DispatchError::InvalidResponse { message: e.to_string() })?;
        parse_reply(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request<'a>(model: &'a str) -> KeepAliveRequest<'a> {
        KeepAliveRequest {
            access_token: "tok",
            project_id: Some("proj-1"),
            model,
            prompt: "hi",
            max_output_tokens: Some(8),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_parse_reply_unwrapped_and_skips_thoughts() {
        let body = json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking", "thought": true},
                {"text": "Hello!"}
            ]}}],
            "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 3}
        });
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.reply_text, "Hello!");
        assert_eq!(
            reply.usage,
            Some(TokenUsage { prompt_tokens: 2, completion_tokens: 3, total_tokens: 5 })
        );
        assert!(parse_reply(&json!({"response": {}})).is_err());
    }

    #[tokio::test]
    async fn test_fetch_catalog_filters_and_maps_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:fetchAvailableModels"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(json!({"project": "proj-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": {
                    "gemini-3-flash": {
                        "displayName": "Gemini 3 Flash",
                        "model": "MODEL_PLACEHOLDER_M18",
                        "quotaInfo": {"remainingFraction": 1.0, "resetTime": "2024-01-01T05:00:00Z"}
                    },
                    "claude-sonnet-4-5": {
                        "model": "MODEL_CLAUDE_4_5_SONNET",
                        "quotaInfo": {"resetTime": "2024-01-01T03:00:00Z"}
                    },
                    "chat_20706": {}
                }
            })))
            .mount(&server)
            .await;

        let client = CloudCodeClient::with_base_url(server.uri()).unwrap();
        let all = client.fetch_model_catalog("tok", Some("proj-1"), None).await.unwrap();
        assert_eq!(all.len(), 3);

        let claude = all.iter().find(|m| m.id == "claude-sonnet-4-5").unwrap();
        assert_eq!(claude.remaining_fraction, Some(0.0));

        let filter = vec!["MODEL_PLACEHOLDER_M18".to_string()];
        let only = client.fetch_model_catalog("tok", Some("proj-1"), Some(&filter)).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, "gemini-3-flash");
        assert_eq!(only[0].label(), "Gemini 3 Flash");
    }

    #[tokio::test]
    async fn test_keep_alive_sends_wrapped_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:generateContent"))
            .and(body_partial_json(json!({
                "project": "proj-1",
                "model": "gemini-3-flash",
                "request": {"generationConfig": {"maxOutputTokens": 8}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {
                    "candidates": [{"content": {"parts": [{"text": " Hi there "}]}}],
                    "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 3, "totalTokenCount": 4}
                }
            })))
            .mount(&server)
            .await;

        let client = CloudCodeClient::with_base_url(server.uri()).unwrap();
        let reply = client.send_keep_alive(request("gemini-3-flash")).await.unwrap();
        assert_eq!(reply.reply_text, "Hi there");
        assert_eq!(reply.usage.unwrap().total_tokens, 4);
    }

    #[tokio::test]
    async fn test_keep_alive_maps_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let client = CloudCodeClient::with_base_url(server.uri()).unwrap();
        let err = client.send_keep_alive(request("gemini-3-flash")).await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::Upstream { status: 429, message: "RESOURCE_EXHAUSTED".to_string() }
        );
    }

    #[tokio::test]
    async fn test_keep_alive_timeout_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1internal:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = CloudCodeClient::with_base_url(server.uri()).unwrap();
        let mut req = request("gemini-3-flash");
        req.timeout = Duration::from_millis(200);
        let err = client.send_keep_alive(req).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { .. }));
    }
}
