// SPDX-License-Identifier: MIT

//! Condition evaluation for workflow edges
//!
//! Transition edges carry `when` conditions such as:
//! - `route == 'conversational'`
//! - `usefulness_verdict == 'not_useful' and retry_count < 2`
//!
//! Conditions are evaluated against the JSON projection of `WorkflowState`.

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::{parse, ParseError};
