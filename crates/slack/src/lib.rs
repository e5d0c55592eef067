//! Slack integration for greetbot.
//!
//! - **Ingress** (`ingress`, `signature`) - decodes and verifies inbound HTTP bodies
//! - **Events** (`events`) - envelope model, triggers, and the handler registry
//! - **Handlers** (`messages`, `commands`, `actions`, `home`) - the bot's behavior
//! - **Web API** (`api`) - outbound `chat.postMessage`, `views.*` and `dialog.open`
//! - **Block Kit** (`blocks`) - typed message, view and dialog payloads
//!
//! # Architecture
//!
//! ```text
//! HTTP body → verify → parse_request → EventDispatcher → Handlers → SlackApi
//!                                            ↓
//!                                      Acknowledge (HTTP response)
//! ```

pub mod ack;
pub mod actions;
pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod home;
pub mod ingress;
pub mod messages;
pub mod signature;

#[cfg(test)]
mod testing;
