//! Memo Router: a webhook pipeline that classifies voice-memo
//! transcriptions into buckets and routes each bucket to its side effects.
//!
//! Incoming payloads are normalized into [`models::Note`]s, classified by a
//! three-tier keyword matcher with a word-count fallback, persisted to a
//! flat-file index keyed by a short content hash, then handed to a bucket
//! handler. Notes that cannot be matched to a CRM record land in a manual
//! review queue with scored business suggestions.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`payload`] | Webhook payload normalization |
//! | [`classify`] | Bucket classification |
//! | [`index`] | Short hash and flat-file note index |
//! | [`actions`] | Per-bucket side-effect handlers |
//! | [`review`] | Review queue and business matching |
//! | [`crm`] | CRM and visit-pool ports |
//! | [`notify`] | Reminder/message ports |
//! | [`journal`] | Per-bucket daily markdown journal |
//! | [`server`] | HTTP ingress |
//! | [`config`] | TOML configuration |

pub mod actions;
pub mod classify;
pub mod config;
pub mod crm;
pub mod index;
pub mod journal;
pub mod models;
pub mod notify;
pub mod payload;
pub mod review;
pub mod server;
