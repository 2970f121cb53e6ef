//! # citeview
//!
//! Citation resolution and document preview for generated answers.
//!
//! An answer from a retrieval-augmented assistant cites its sources inline as
//! bracketed markers (`[EWS_API#page=34]`). This crate turns those markers
//! into numbered, clickable references, resolves each one to where the
//! document actually lives, and loads it for display: directly for local and
//! blob-stored files, or through a degrading chain of embed strategies for
//! SharePoint-hosted ones.
//!
//! ## Architecture
//!
//! ```text
//! answer text ──▶ parser ──▶ markers ──▶ panel.select(label)
//!                   │                          │
//!                   ▼                          ├──▶ fetch ──▶ handle (blob:…#page=N)
//!               resolver                       │
//!                                              └──▶ preview ──▶ embed / new tab
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`resolver`] | Label → location resolution |
//! | [`pattern`] | Citation-like token patterns |
//! | [`parser`] | Marker parsing, numbering, markup |
//! | [`transport`] | Backend HTTP access behind the [`transport::Transport`] trait |
//! | [`fetch`] | Document retrieval and failure classification |
//! | [`handle`] | Revocable local handles for fetched bytes |
//! | [`embed`] | SharePoint embed-view address synthesis |
//! | [`preview`] | SharePoint preview state machine |
//! | [`panel`] | Viewer panel: selection, staleness, handle ownership |
//! | [`error`] | Failure taxonomy |
//! | [`server`] | JSON HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod handle;
pub mod models;
pub mod panel;
pub mod parser;
pub mod pattern;
pub mod preview;
pub mod resolver;
pub mod server;
pub mod transport;
