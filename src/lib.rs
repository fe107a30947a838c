//! # AZ-kvíz Game Library
//!
//! This library provides the core logic for a two-player trivia board
//! game in the style of AZ-kvíz: players answer questions to claim tiles
//! on a triangular board, trying to connect all three edges. It handles
//! rooms, anonymous player identities, matchmaking, game state, and
//! real-time synchronization between player screens and the room owner's
//! dashboard.
//!
//! The embedding server owns the websockets and the HTTP surface; this
//! crate owns everything behind them. See [`registry::Registry`] for the
//! state-changing API and [`session::run_session`] for driving one
//! socket.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]

pub mod board;
pub mod bus;
pub mod connectivity;
pub mod constants;
pub mod game;
pub mod question;
pub mod registry;
pub mod session;
pub mod store;
pub mod view;
