//! # gifbot core
//!
//! The retrieval and asset cache subsystem behind gifbot: corpus loading,
//! fuzzy matching, ranking, the store abstraction, and the reconciler that
//! turns ranked records into reusable remote handles.
//!
//! ```text
//! Store ──▶ corpus ──▶ fuzzy ──▶ rank ──▶ reconcile ──▶ DeliveryGateway
//!   ▲                                         │
//!   └────────────── update_handle ────────────┘
//! ```
//!
//! This crate has no database, HTTP, or configuration dependencies. The
//! application crate supplies a [`store::Store`] and a
//! [`gateway::DeliveryGateway`] implementation.

pub mod corpus;
pub mod error;
pub mod fuzzy;
pub mod gateway;
pub mod models;
pub mod rank;
pub mod reconcile;
pub mod search;
pub mod store;

pub use error::{Error, MalformedRecord};
pub use models::{MatchResult, RawRow, Record};
