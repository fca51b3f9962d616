//! Discord bot integration.
//!
//! This module provides the chat-command layer: parsing commands, running
//! them against the shared state and relaying replies to Discord.

pub mod client;
pub mod commands;
pub mod format;
pub mod handler;

pub use client::DiscordBotBuilder;
