//! # Chat Relay Terminal Client
//!
//! A minimal line-based client for the chat relay. Everything the server
//! sends is printed as-is; every line typed on stdin is sent followed by a
//! newline. The handshake (token, then username) is driven by the server's
//! prompts, so the client needs no protocol state of its own.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Classifies typed lines into local commands (`/quit`, `/help`) and text
//! to send.
//!
//! ### Network Module (`network`)
//! Owns the TCP connection and the relay loop between the socket and the
//! terminal.

pub mod input;
pub mod network;
