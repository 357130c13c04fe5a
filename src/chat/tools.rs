use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::{ToolCall, ToolDefinition};

pub const BOOK_APPOINTMENT: &str = "bookAppointment";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub date: String,
    pub time: String,
}

/// Formats a day the way the assistant is told about it, e.g. `Fri Oct 16 2026`.
pub fn format_today(today: NaiveDate) -> String {
    today.format("%a %b %d %Y").to_string()
}

pub fn book_appointment_definition(today: NaiveDate) -> ToolDefinition {
    ToolDefinition::function(
        BOOK_APPOINTMENT,
        format!(
            "Book an appointment for the patient. If the patient doesn't provide a date and time, ask for it instead of making assumptions. Today is {}.",
            format_today(today)
        ),
        json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "The date of the appointment in the YYYY-MM-DD format"
                },
                "time": {
                    "type": "string",
                    "description": "The time of the appointment in the HH:MM 24-hour format"
                }
            },
            "required": ["date", "time"],
            "additionalProperties": false
        }),
    )
}

/// Runs tool calls requested by the model. Failures come back as an
/// `{"error": ...}` object so they can be streamed like any other result.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    appointment_delay: Duration,
}

impl ToolExecutor {
    pub fn new(appointment_delay: Duration) -> Self {
        Self { appointment_delay }
    }

    pub fn definitions(&self, today: NaiveDate) -> Vec<ToolDefinition> {
        vec![book_appointment_definition(today)]
    }

    pub async fn execute(&self, call: &ToolCall) -> Value {
        match call.function.name.as_str() {
            BOOK_APPOINTMENT => self.book_appointment(&call.function.arguments).await,
            other => {
                tracing::warn!(tool = other, "Model requested an unknown tool");
                json!({ "error": format!("Unknown tool: {}", other) })
            }
        }
    }

    async fn book_appointment(&self, arguments: &str) -> Value {
        let appointment: Appointment = match serde_json::from_str(arguments) {
            Ok(appointment) => appointment,
            Err(e) => {
                return json!({ "error": format!("Invalid arguments for {}: {}", BOOK_APPOINTMENT, e) })
            }
        };

        tokio::time::sleep(self.appointment_delay).await;
        tracing::info!(date = %appointment.date, time = %appointment.time, "Appointment booked");

        json!(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Duration::from_millis(0))
    }

    #[test]
    fn description_mentions_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let tool = book_appointment_definition(today);

        assert_eq!(tool.function.name, "bookAppointment");
        assert!(tool.function.description.ends_with("Today is Fri Oct 16 2026."));
        assert_eq!(tool.function.parameters["required"], json!(["date", "time"]));
    }

    #[test]
    fn single_digit_days_are_zero_padded() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(format_today(day), "Mon Mar 02 2026");
    }

    #[tokio::test]
    async fn booking_echoes_date_and_time() {
        let call = ToolCall::new("call_1", BOOK_APPOINTMENT, r#"{"date":"2026-10-20","time":"14:30"}"#);

        let result = executor().execute(&call).await;

        assert_eq!(result, json!({ "date": "2026-10-20", "time": "14:30" }));
    }

    #[tokio::test(start_paused = true)]
    async fn booking_waits_for_the_configured_delay() {
        let executor = ToolExecutor::new(Duration::from_secs(3));
        let call = ToolCall::new("call_1", BOOK_APPOINTMENT, r#"{"date":"2026-10-20","time":"14:30"}"#);

        let started = tokio::time::Instant::now();
        executor.execute(&call).await;

        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_yield_error_objects() {
        let unknown = executor()
            .execute(&ToolCall::new("c1", "orderPizza", "{}"))
            .await;
        assert!(unknown["error"].as_str().unwrap().contains("orderPizza"));

        let malformed = executor()
            .execute(&ToolCall::new("c2", BOOK_APPOINTMENT, r#"{"date":"2026-10-20"}"#))
            .await;
        assert!(malformed.get("error").is_some());
    }
}
