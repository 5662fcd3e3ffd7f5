// SPDX-License-Identifier: MIT

//! The self-correcting retrieval-augmented generation workflow

pub mod builder;
pub mod checkpoint;
pub mod condition;
pub mod config;
pub mod graph;
pub mod profile;
pub mod registry;
pub mod server;
pub mod state;
pub mod steps;
