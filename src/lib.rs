//! Nutrition assistant backend: patient profiles, a retrieval-augmented
//! knowledge base, and streamed chat completions over HTTP.

pub mod chat;
pub mod core;
pub mod database;
pub mod llm;
pub mod patients;
pub mod rag;
pub mod server;
pub mod state;
