pub mod body;
pub mod chat;
pub mod config;
pub mod documents;
pub mod health;
pub mod patients;
pub mod search;
