//! # sane-ingest
//!
//! Normalizes YouTube channel records from heterogeneous sources and keeps
//! them in a local SQLite store.
//!
//! Raw records arrive as JSON resources (from files or the SaneAPI service),
//! positional string lists, or field maps. Each is turned into a
//! [`Channel`](models::Channel) that carries its own diagnostics: a missing
//! identifier aborts the record, anything else only warns. A batch is
//! reported with one status line and the usable channels are written with a
//! single statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────────┐
//! │ Raw sources │──▶│ Builders  │──▶│  Batch   │──▶│ StatementRunner  │
//! │ JSON/list/  │   │ + coerce  │   │ ingestor │   │ SQLite, per-call │
//! │ map/bytes   │   └───────────┘   └──────────┘   │ open/close       │
//! └─────────────┘                                  └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | The channel record |
//! | [`diagnostics`] | Per-entity errors, warnings, abort flag |
//! | [`coerce`] | Field coercion from untyped containers |
//! | [`builder`] | JSON, string-list, and map builders |
//! | [`consumer`] | Row consumers: silent, capture, step cursor |
//! | [`store`] | Statement execution with guaranteed handle release |
//! | [`migrate`] | Schema creation |
//! | [`channels`] | Insert and read back channels |
//! | [`ingest`] | Batch ingestion and reporting |
//! | [`remote`] | SaneAPI client |
//! | [`query`] | Ad-hoc SQL output |

pub mod builder;
pub mod channels;
pub mod coerce;
pub mod config;
pub mod consumer;
pub mod diagnostics;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod query;
pub mod remote;
pub mod store;
