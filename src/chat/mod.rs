//! Chat-serving path: embed the question, retrieve sources, stream a grounded answer.

pub mod prompt;
mod service;

pub use service::{APOLOGY, AnswerEvent, AnswerStream, ChatError, ChatService, ChatSettings};
