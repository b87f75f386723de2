//! Hood Hive: community-project discovery and engagement backend.
//!
//! Geo-located civic projects with one-vote-per-user voting, comments and
//! authenticated submission, served as a REST/JSON API (Axum) over a Sled
//! document store. The single transactional invariant lives in
//! `storage::Storage::record_vote`.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod rest;
pub mod storage;
