//! Patient-aware chat completions with retrieved context and appointment booking.

mod messages;
mod prompt;
mod service;
mod tools;

pub use messages::{to_wire_messages, ConversationMessage, ToolInvocation};
pub use prompt::build_system_prompt;
pub use service::{ChatEvent, ChatOptions, ChatService};
pub use tools::{book_appointment_definition, format_today, Appointment, ToolExecutor, BOOK_APPOINTMENT};
