//! TimePass - a small photo and video social network
//!
//! Feed, stories, profiles, follows, search and direct messages between
//! mutual followers, served as a JSON API over a SQLite store.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod realtime;
pub mod services;
pub mod storage;
pub mod views;
