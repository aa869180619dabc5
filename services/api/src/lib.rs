pub mod config;
pub mod error;
pub mod interviewer;
pub mod llm;
pub mod prompt_loader;
pub mod prompts;
pub mod resume;
pub mod routes;
pub mod store;
pub mod transcriber;
