// src/lib.rs — Library root for zabot

pub mod api;
pub mod app;
pub mod cli;
pub mod core;
pub mod dashboard;
pub mod infra;
pub mod plugins;
pub mod security;
pub mod slack;
pub mod storage;
