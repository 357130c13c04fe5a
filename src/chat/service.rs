use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::messages::{to_wire_messages, ConversationMessage};
use super::prompt::build_system_prompt;
use super::tools::ToolExecutor;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, EventReceiver, LlmProvider, ProviderEvent, Role};
use crate::patients::PatientStore;
use crate::rag::Retriever;

const EVENT_BUFFER: usize = 64;

/// Event streamed to the client while a completion runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Text { delta: String },
    ToolCall { id: String, name: String, arguments: Value },
    ToolResult { id: String, name: String, result: Value },
    Finish { reason: String },
    Error { message: String },
}

impl ChatEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Text { .. } => "text",
            ChatEvent::ToolCall { .. } => "tool_call",
            ChatEvent::ToolResult { .. } => "tool_result",
            ChatEvent::Finish { .. } => "finish",
            ChatEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f64,
}

#[derive(Clone)]
pub struct ChatService {
    patients: PatientStore,
    retriever: Retriever,
    provider: Arc<dyn LlmProvider>,
    tools: ToolExecutor,
    options: ChatOptions,
}

impl ChatService {
    pub fn new(
        patients: PatientStore,
        retriever: Retriever,
        provider: Arc<dyn LlmProvider>,
        tools: ToolExecutor,
        options: ChatOptions,
    ) -> Self {
        Self {
            patients,
            retriever,
            provider,
            tools,
            options,
        }
    }

    /// Starts a completion for `patient_id`. Everything that can fail before
    /// the first token is reported through the returned `Result`; later
    /// failures arrive as a final [`ChatEvent::Error`].
    pub async fn start(
        &self,
        patient_id: &str,
        history: Vec<ConversationMessage>,
    ) -> Result<mpsc::Receiver<ChatEvent>, ApiError> {
        self.start_on(patient_id, history, Local::now().date_naive())
            .await
    }

    pub(crate) async fn start_on(
        &self,
        patient_id: &str,
        history: Vec<ConversationMessage>,
        today: NaiveDate,
    ) -> Result<mpsc::Receiver<ChatEvent>, ApiError> {
        let Some(last) = history.last() else {
            return Err(ApiError::BadRequest("Messages must not be empty".to_string()));
        };

        let patient = self
            .patients
            .get(patient_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Patient {} not found", patient_id)))?;

        let context = if last.role == Role::User {
            self.retriever.retrieve(&last.content).await?.text
        } else {
            String::new()
        };

        let mut messages = vec![ChatMessage::system(build_system_prompt(&patient, &context))];
        messages.extend(to_wire_messages(&history)?);

        let request = ChatRequest::new(self.options.model.clone(), messages)
            .with_temperature(self.options.temperature)
            .with_tools(self.tools.definitions(today));

        tracing::info!(
            patient_id = %patient.id,
            turns = history.len(),
            context_chars = context.len(),
            "Starting chat completion"
        );

        let upstream = self.provider.stream_chat(request).await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(forward_events(upstream, self.tools.clone(), tx));
        Ok(rx)
    }
}

async fn forward_events(mut upstream: EventReceiver, tools: ToolExecutor, tx: mpsc::Sender<ChatEvent>) {
    while let Some(event) = upstream.recv().await {
        let outgoing = match event {
            Ok(ProviderEvent::TextDelta(delta)) => vec![ChatEvent::Text { delta }],
            Ok(ProviderEvent::ToolCall(call)) => {
                let announce = ChatEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: parse_arguments(&call.function.arguments),
                };
                if tx.send(announce).await.is_err() {
                    return;
                }
                let result = tools.execute(&call).await;
                vec![ChatEvent::ToolResult {
                    id: call.id,
                    name: call.function.name,
                    result,
                }]
            }
            Ok(ProviderEvent::Finish(reason)) => vec![ChatEvent::Finish { reason }],
            Err(e) => {
                tracing::error!("Chat stream failed: {}", e);
                let _ = tx
                    .send(ChatEvent::Error {
                        message: "Something went wrong, try again".to_string(),
                    })
                    .await;
                return;
            }
        };

        for event in outgoing {
            if tx.send(event).await.is_err() {
                tracing::debug!("Client disconnected; dropping chat stream");
                return;
            }
        }
    }
}

fn parse_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::database::test_pool;
    use crate::llm::mock::MockProvider;
    use crate::llm::ToolCall;
    use crate::patients::{Gender, PatientFields};
    use crate::rag::{DocumentIngestor, NewDocument, SearchParams, SectionStore, SqliteSectionStore};

    struct Fixture {
        service: ChatService,
        provider: MockProvider,
        patient_id: String,
        _dir: tempfile::TempDir,
    }

    async fn fixture(events: Vec<ProviderEvent>) -> Fixture {
        fixture_with(MockProvider::new().with_events(events)).await
    }

    async fn fixture_with(provider: MockProvider) -> Fixture {
        let (pool, dir) = test_pool().await;
        let llm: Arc<dyn LlmProvider> = Arc::new(provider.clone());

        let sections: Arc<dyn SectionStore> =
            Arc::new(SqliteSectionStore::new(pool.clone(), 3).await.unwrap());
        DocumentIngestor::new(sections.clone(), llm.clone())
            .ingest(NewDocument {
                name: "Macros".to_string(),
                url: None,
                content: "Protein rebuilds muscle\n---\nFiber keeps you full".to_string(),
            })
            .await
            .unwrap();

        let patients = PatientStore::new(pool).await.unwrap();
        let patient = patients
            .create(PatientFields {
                name: "Sam".to_string(),
                age: 41,
                gender: Gender::Male,
                fitness_goal: Some("build muscle".to_string()),
                liked_foods: vec!["chicken".to_string()],
                disliked_foods: vec![],
                food_allergies: vec!["peanuts".to_string()],
                health_conditions: vec![],
            })
            .await
            .unwrap();

        let retriever = Retriever::new(
            sections,
            llm.clone(),
            SearchParams {
                threshold: 0.5,
                limit: 4,
            },
        );
        let service = ChatService::new(
            patients,
            retriever,
            llm,
            ToolExecutor::new(Duration::from_millis(0)),
            ChatOptions {
                model: "gpt-test".to_string(),
                temperature: 0.0,
            },
        );

        Fixture {
            service,
            provider,
            patient_id: patient.id,
            _dir: dir,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[tokio::test]
    async fn streams_text_and_sends_persona_with_context() {
        let f = fixture(vec![
            ProviderEvent::TextDelta("Eat ".to_string()),
            ProviderEvent::TextDelta("eggs.".to_string()),
            ProviderEvent::Finish("stop".to_string()),
        ])
        .await;

        let rx = f
            .service
            .start_on(
                &f.patient_id,
                vec![ConversationMessage::user("How much protein do I need?")],
                today(),
            )
            .await
            .unwrap();
        let events = collect(rx).await;

        assert_eq!(
            events,
            vec![
                ChatEvent::Text { delta: "Eat ".to_string() },
                ChatEvent::Text { delta: "eggs.".to_string() },
                ChatEvent::Finish { reason: "stop".to_string() },
            ]
        );

        let request = f.provider.last_request().lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "gpt-test");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.tools.len(), 1);
        assert!(request.tools[0].function.description.contains("Fri Oct 16 2026"));

        let system = request.messages[0].content.clone().unwrap();
        assert!(system.contains("The patient is a 41 years old male. Their name is Sam."));
        assert!(system.contains("They are allergic to the following foods: peanuts."));
        assert!(system.ends_with("Protein rebuilds muscle"));
        assert!(!system.contains("Fiber keeps you full"));
        assert_eq!(request.messages.len(), 2);
    }

    #[tokio::test]
    async fn tool_calls_are_executed_and_streamed() {
        let f = fixture(vec![
            ProviderEvent::ToolCall(ToolCall::new(
                "call_9",
                "bookAppointment",
                r#"{"date":"2026-10-21","time":"08:15"}"#,
            )),
            ProviderEvent::Finish("tool_calls".to_string()),
        ])
        .await;

        let rx = f
            .service
            .start_on(
                &f.patient_id,
                vec![ConversationMessage::user("Book me Wednesday 8:15")],
                today(),
            )
            .await
            .unwrap();
        let events = collect(rx).await;

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            ChatEvent::ToolCall {
                id: "call_9".to_string(),
                name: "bookAppointment".to_string(),
                arguments: json!({ "date": "2026-10-21", "time": "08:15" }),
            }
        );
        assert_eq!(
            events[1],
            ChatEvent::ToolResult {
                id: "call_9".to_string(),
                name: "bookAppointment".to_string(),
                result: json!({ "date": "2026-10-21", "time": "08:15" }),
            }
        );
        assert_eq!(events[2].name(), "finish");
    }

    #[tokio::test]
    async fn upstream_failure_ends_stream_with_error_event() {
        let f = fixture_with(
            MockProvider::new()
                .with_events(vec![ProviderEvent::TextDelta("Eat ".to_string())])
                .failing_stream("connection reset"),
        )
        .await;

        let rx = f
            .service
            .start_on(&f.patient_id, vec![ConversationMessage::user("protein?")], today())
            .await
            .unwrap();
        let events = collect(rx).await;

        assert_eq!(
            events,
            vec![
                ChatEvent::Text { delta: "Eat ".to_string() },
                ChatEvent::Error {
                    message: "Something went wrong, try again".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn no_retrieval_when_last_turn_is_not_from_user() {
        let f = fixture(vec![ProviderEvent::Finish("stop".to_string())]).await;
        let calls = f.provider.embed_calls();
        let before = calls.load(std::sync::atomic::Ordering::SeqCst);

        let rx = f
            .service
            .start_on(
                &f.patient_id,
                vec![
                    ConversationMessage::user("protein?"),
                    ConversationMessage::assistant("Plenty of protein."),
                ],
                today(),
            )
            .await
            .unwrap();
        collect(rx).await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), before);
        let request = f.provider.last_request().lock().unwrap().clone().unwrap();
        assert!(!request.messages[0]
            .content
            .as_deref()
            .unwrap()
            .contains("may be helpful"));
    }

    #[tokio::test]
    async fn empty_history_and_unknown_patient_fail_before_streaming() {
        let f = fixture(vec![]).await;

        let empty = f.service.start(&f.patient_id, vec![]).await.unwrap_err();
        assert!(matches!(empty, ApiError::BadRequest(_)));

        let missing = f
            .service
            .start("nope", vec![ConversationMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(missing, ApiError::NotFound(_)));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ChatEvent::Text {
            delta: "hi".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "text", "delta": "hi" })
        );
    }
}
