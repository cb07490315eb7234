//! # gifbot
//!
//! Fuzzy search over a small corpus of captioned GIFs, delivered through a
//! Telegram bot and a web search page. Each asset is uploaded to the chat
//! service at most once; the handle it returns is cached in SQLite and
//! reused for every later delivery.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  SQLite  │──▶│ gifbot-core  │──▶│ AssetResolver │──▶ Bot API upload
//! │   gifs   │   │ load / match │   │ cache / upload│
//! └────▲─────┘   │ / rank       │   └──────┬───────┘
//!      │         └──────┬───────┘          │
//!      └────────────────┼── update_handle ─┘
//!             ┌─────────┴─────────┐
//!             ▼                   ▼
//!        ┌─────────┐        ┌──────────┐
//!        │   Bot   │        │   Web    │
//!        │ (tg)    │        │ (axum)   │
//!        └─────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gifbot init
//! gifbot add cat.gif "funny cat jumping"
//! gifbot search "cat"
//! gifbot serve bot
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` backend |
//! | [`corpus_cmd`] | `add` / `list` / `forget` commands |
//! | [`search`] | CLI search |
//! | [`auth`] | Bot authorization list |
//! | [`telegram`] | Bot API client and upload gateway |
//! | [`bot`] | Telegram front end |
//! | [`server`] | Web front end |
//! | [`logging`] | Tracing subscriber setup |

pub mod auth;
pub mod bot;
pub mod config;
pub mod corpus_cmd;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod telegram;
