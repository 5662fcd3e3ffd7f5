// SPDX-License-Identifier: MIT

//! Transition table: which step runs next, given the state after a step

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::types::{EdgeDef, RunLimits, StepName, Target};
use crate::adk::error::RagError;
use crate::rag::condition::{self, Expression};

/// A compiled edge
#[derive(Debug, Clone)]
struct Edge {
    to: Target,
    when: Option<Expression>,
}

/// Ordered, conditional out-edges per step. The first edge whose condition
/// holds is taken; an edge without condition always holds.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    entry: StepName,
    edges: HashMap<StepName, Vec<Edge>>,
}

impl TransitionTable {
    /// Compile edge definitions, parsing every condition up front
    pub fn from_defs(entry: StepName, defs: Vec<EdgeDef>) -> Result<Self, RagError> {
        let mut edges: HashMap<StepName, Vec<Edge>> = HashMap::new();
        for def in defs {
            let when = match def.when.as_deref() {
                None => None,
                Some(text) => Some(condition::parse(text).map_err(|e| {
                    RagError::config(format!(
                        "invalid condition on edge {} -> {}: {}",
                        def.from, def.to, e
                    ))
                })?),
            };
            edges.entry(def.from).or_default().push(Edge { to: def.to, when });
        }
        Ok(Self { entry, edges })
    }

    /// The self-correcting RAG graph
    pub fn standard(limits: &RunLimits) -> Result<Self, RagError> {
        Self::from_defs(StepName::Route, standard_edges(limits))
    }

    pub fn entry(&self) -> StepName {
        self.entry
    }

    /// Resolve the next target after `from`, given the state projection
    pub fn next(&self, from: StepName, state: &Value) -> Result<Target, RagError> {
        let edges = self
            .edges
            .get(&from)
            .ok_or_else(|| RagError::config(format!("no edges out of step {}", from)))?;

        for edge in edges {
            let taken = match &edge.when {
                None => true,
                Some(expr) => condition::evaluate(expr, state),
            };
            if taken {
                log::debug!("Transition {} -> {}", from, edge.to);
                return Ok(edge.to);
            }
        }
        Err(RagError::config(format!(
            "no edge out of step {} matched the current state",
            from
        )))
    }

    /// Check that the table only targets registered steps and that every step
    /// with out-edges ends in an unconditional fallback.
    pub fn validate(&self, registered: &HashSet<StepName>) -> Result<(), RagError> {
        if !registered.contains(&self.entry) {
            return Err(RagError::config(format!(
                "entry step {} is not registered",
                self.entry
            )));
        }

        for (from, edges) in &self.edges {
            for edge in edges {
                if let Target::Step(to) = edge.to {
                    if !registered.contains(&to) {
                        return Err(RagError::config(format!(
                            "edge {} -> {} targets an unregistered step",
                            from, to
                        )));
                    }
                }
            }
            match edges.last() {
                Some(Edge { when: None, .. }) => {}
                _ => {
                    return Err(RagError::config(format!(
                        "step {} has no unconditional fallback edge",
                        from
                    )))
                }
            }
        }

        let reachable = self.reachable();
        for step in &reachable {
            if !self.edges.contains_key(step) {
                return Err(RagError::config(format!(
                    "step {} is reachable but has no out-edges",
                    step
                )));
            }
        }
        Ok(())
    }

    /// Steps reachable from the entry, ignoring conditions
    fn reachable(&self) -> HashSet<StepName> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.entry];
        while let Some(step) = stack.pop() {
            if !seen.insert(step) {
                continue;
            }
            for edge in self.edges.get(&step).into_iter().flatten() {
                if let Target::Step(next) = edge.to {
                    stack.push(next);
                }
            }
        }
        seen
    }
}

fn standard_edges(limits: &RunLimits) -> Vec<EdgeDef> {
    use StepName::*;

    vec![
        EdgeDef::when(Route, Target::Step(Generate), "route == 'conversational'"),
        EdgeDef::always(Route, Target::Step(Retrieve)),
        EdgeDef::always(Retrieve, Target::Step(Compress)),
        EdgeDef::always(Compress, Target::Step(Generate)),
        EdgeDef::always(Generate, Target::Step(VerifyGrounding)),
        EdgeDef::when(VerifyGrounding, Target::End, "route == 'conversational'"),
        EdgeDef::when(
            VerifyGrounding,
            Target::Step(Generate),
            format!(
                "grounding_verdict == 'hallucinated' and regeneration_count < {}",
                limits.max_regenerations
            ),
        ),
        // regeneration budget spent: finish with the last answer, flagged low confidence
        EdgeDef::when(VerifyGrounding, Target::End, "grounding_verdict == 'hallucinated'"),
        EdgeDef::always(VerifyGrounding, Target::Step(VerifyUsefulness)),
        EdgeDef::when(VerifyUsefulness, Target::End, "route == 'conversational'"),
        EdgeDef::when(
            VerifyUsefulness,
            Target::Step(Rewrite),
            format!(
                "usefulness_verdict == 'not_useful' and retry_count < {}",
                limits.max_rewrites
            ),
        ),
        EdgeDef::always(VerifyUsefulness, Target::End),
        EdgeDef::always(Rewrite, Target::Step(Retrieve)),
    ]
}
