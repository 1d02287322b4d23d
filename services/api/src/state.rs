//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the configuration
//! and the three gateways. Everything here is built once at startup and only
//! read by handlers.

use crate::config::Config;
use chiron_core::{
    forwarder::CommandForwarder, generator::LessonGenerator, speech::SpeechGateway,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lesson_generator: Arc<dyn LessonGenerator>,
    pub forwarder: Arc<dyn CommandForwarder>,
    pub speech: Arc<SpeechGateway>,
}
