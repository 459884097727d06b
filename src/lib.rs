//! webdetect - cached image web detection.
//!
//! Fronts the Cloud Vision web-detection API with a cache kept on image
//! documents in a document store. Interactive callers go through the
//! `detectWeb` endpoint; a batch backfill fills the cache for every image in
//! an active-id list.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod server;
pub mod services;
pub mod vision;
