//! # verdant-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **JSON API** for status, manual overrides, the emergency
//!   stop, and rule reloads (`/api/status`, `/api/devices/{id}/override`,
//!   `/api/emergency-stop`, `/api/rules`, `/api/health`)
//! - Serve the **live event stream** over SSE
//!   (`/api/events/stream`), starting every subscription with a full
//!   status snapshot frame
//! - Map HTTP requests into control-actor commands and command errors
//!   into typed HTTP responses
//!
//! ## Dependency rule
//! Depends on `verdant-app` (control handle, event bus) and
//! `verdant-domain` (types used in request/response mapping). Never
//! leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
