//! # verdant-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RelayDriver` — drive one relay output
//!   - `SensorSource` — supply the latest sensor snapshot
//!   - `EventPublisher` — fan out broadcast events
//!   - `EventSink` — persist control events (fire-and-forget)
//! - Provide the pure decision pipeline:
//!   - `engine` — rule evaluation and per-device vote resolution
//!   - `safety` — override / emergency-stop masking
//!   - `resolver` — dependency expansion into an ordered transition plan
//! - Run the **control actor** (`control`) that owns all mutable device
//!   state and serializes ticks and commands
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `verdant-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod control;
pub mod engine;
pub mod event_bus;
pub mod ports;
pub mod resolver;
pub mod safety;
