pub mod ambiguity;
pub mod chat;
pub mod config;
pub mod database;
pub mod http_client;
pub mod llm_client;
pub mod memory;
pub mod recall;
pub mod reply;
pub mod runtime;
pub mod server;
pub mod tone;

#[cfg(test)]
pub(crate) mod testing;
