//! ARIA - voice-activated conversational assistant
//!
//! This library provides the core of the assistant:
//! - Session orchestration (wake word, command capture, dialogue, speech)
//! - Conversation context and completion service clients
//! - Speech recognition and synthesis
//! - I/O adapters for the microphone, the terminal and the browser
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Front ends                       │
//! │    Microphone   │   Console   │   Browser (HTTP)     │
//! └────────────────────┬────────────────────────────────┘
//!                      │  IoAdapter
//! ┌────────────────────▼────────────────────────────────┐
//! │                SessionOrchestrator                   │
//! │  Wake Word  │  Command Capture  │  Phase tracking    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │  DialogueEngine (Gemini / OpenAI)  │  Synthesizer    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod api;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod session;
pub mod voice;

pub use config::{Config, SessionSettings};
pub use error::{Error, Result};
pub use session::{
    Command, Phase, Reply, ReplyKind, SessionOrchestrator, SessionTable, StepOutcome, Utterance,
};
