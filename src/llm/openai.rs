use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{EventReceiver, LlmProvider};
use super::sse::{SseData, SseDecoder};
use super::types::{ChatRequest, ProviderEvent, ToolCall};
use crate::core::config::settings::OpenAiSettings;
use crate::core::errors::ApiError;

/// Client for the OpenAI HTTP API and compatible servers.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    embedding_model: String,
    embedding_dimensions: usize,
}

impl OpenAiProvider {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(ApiError::internal)?;

        if settings.api_key.is_none() {
            tracing::warn!("No OpenAI API key configured; requests will be sent unauthenticated");
        }

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client,
            embedding_model: settings.embedding_model.clone(),
            embedding_dimensions: settings.embedding_dimensions,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn embedding_dimensions(&self) -> usize {
        self.embedding_dimensions
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
            "dimensions": self.embedding_dimensions,
        });

        let res = self
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Embedding request failed ({}): {}",
                status, text
            )));
        }

        let mut payload: EmbeddingResponse = res.json().await.map_err(ApiError::upstream)?;
        payload.data.sort_by_key(|item| item.index);

        if payload.data.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "Embedding count mismatch: sent {}, received {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<EventReceiver, ApiError> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if !request.tools.is_empty() {
                obj.insert("tools".to_string(), json!(request.tools));
            }
        }

        let res = self
            .post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Chat completion failed ({}): {}",
                status, text
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut state = StreamState::default();

            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(ApiError::upstream(e))).await;
                        return;
                    }
                };

                for data in decoder.push(&bytes) {
                    let payload = match data {
                        SseData::Done => {
                            for event in state.finish() {
                                if tx.send(Ok(event)).await.is_err() {
                                    return;
                                }
                            }
                            return;
                        }
                        SseData::Payload(payload) => payload,
                    };

                    let chunk = match serde_json::from_str::<Value>(&payload) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            tracing::warn!("Skipping malformed completion chunk: {}", e);
                            continue;
                        }
                    };

                    for event in state.apply(&chunk) {
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            if let Some(SseData::Payload(payload)) = decoder.finish() {
                if let Ok(chunk) = serde_json::from_str::<Value>(&payload) {
                    for event in state.apply(&chunk) {
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            for event in state.finish() {
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds completion chunks into provider events. Text is forwarded as it
/// arrives; tool calls are streamed in fragments keyed by index and only
/// emitted once complete.
#[derive(Debug, Default)]
struct StreamState {
    tool_calls: BTreeMap<u64, PartialToolCall>,
    finish_reason: Option<String>,
    finished: bool,
}

impl StreamState {
    fn apply(&mut self, chunk: &Value) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        let choice = &chunk["choices"][0];

        if let Some(content) = choice["delta"]["content"].as_str() {
            if !content.is_empty() {
                events.push(ProviderEvent::TextDelta(content.to_string()));
            }
        }

        if let Some(calls) = choice["delta"]["tool_calls"].as_array() {
            for call in calls {
                let index = call["index"].as_u64().unwrap_or(0);
                let entry = self.tool_calls.entry(index).or_default();
                if let Some(id) = call["id"].as_str() {
                    entry.id.push_str(id);
                }
                if let Some(name) = call["function"]["name"].as_str() {
                    entry.name.push_str(name);
                }
                if let Some(arguments) = call["function"]["arguments"].as_str() {
                    entry.arguments.push_str(arguments);
                }
            }
        }

        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(reason.to_string());
        }

        events
    }

    fn finish(&mut self) -> Vec<ProviderEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events: Vec<ProviderEvent> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments
                };
                ProviderEvent::ToolCall(ToolCall::new(call.id, call.name, arguments))
            })
            .collect();

        let reason = self
            .finish_reason
            .take()
            .unwrap_or_else(|| "stop".to_string());
        events.push(ProviderEvent::Finish(reason));
        events
    }
}
