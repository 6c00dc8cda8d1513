//! Send source files and instructions to a hosted LLM and write the files it
//! generates back into the repository.
//!
//! The flow for one item is [`prompt::build_messages`] ->
//! [`providers::ChatClient::send_message`] -> [`parser::parse`] ->
//! [`writer::write_files`]; [`pipeline`] runs it over a batch.

pub mod config;
pub mod error;
pub mod instructions;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod repo;
pub mod tracking;
pub mod writer;

pub use error::{Error, ErrorKind, Result};
