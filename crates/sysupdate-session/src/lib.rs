//! sysupdate session - Update session controller
//!
//! This crate provides the update-session state machine:
//! - `controller` - Controller actor owning the session state
//! - `config` - Session configuration (TOML)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  SessionCommand   ┌──────────────────────┐
//! │  Presentation    │──────────────────▶│   ControllerActor    │
//! │ (SessionHandle)  │                   │ (session state owner)│
//! └────────▲─────────┘                   └───┬──────────▲───────┘
//!          │                                 │          │
//!          │ SessionEvent (broadcast)        │ calls    │ TaggedSignal
//!          │                                 ▼          │ (mpsc)
//!          │                        ┌──────────────────────┐
//!          └────────────────────────│  TransactionService  │
//!                                   └──────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod controller;

pub use config::{ConfigError, SessionConfig};
pub use controller::{spawn_controller, ControllerError, SessionEvent, SessionHandle};
