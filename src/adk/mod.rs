// SPDX-License-Identifier: MIT

//! Gateways to the external collaborators of the workflow: the model runtime
//! and the document store, plus the shared error type.

pub mod error;
pub mod model;
pub mod retrieval;
