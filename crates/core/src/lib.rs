pub mod error;
pub mod forwarder;
pub mod generator;
pub mod lesson;
pub mod llm_client;
pub mod signing;
pub mod speech;

#[cfg(test)]
mod test_support;

/// Command identifier the downstream executor interprets as "speak this text".
pub const SPEAK_COMMAND: &str = "SPEAK";
