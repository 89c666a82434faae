//! Quillpost: a small community blog where authors publish posts into
//! groups, readers comment, and everyone can follow the writers they like.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
