//! Wattwisectl library - exposes modules for integration tests

pub mod chat;
pub mod cli;
pub mod commands;
pub mod output;
