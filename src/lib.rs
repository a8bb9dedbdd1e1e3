//! Submission, review, and access-control core for conference management.
//!
//! The crate keeps papers, reviews, and comments in Postgres, answers
//! per-viewer visibility questions under configurable blind-review
//! policy, orders review/comment discussion timelines, and imports and
//! exports paper-status JSON documents.

pub mod authz;
pub mod comment;
pub mod config;
pub mod conflict;
pub mod contact;
pub mod db;
pub mod docs;
pub mod error;
pub mod paper;
pub mod prefs;
pub mod review;
pub mod rights;
pub mod state;
pub mod status;
pub mod tags;
pub mod timeline;

pub use error::{Error, Result};
