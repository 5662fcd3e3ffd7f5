// SPDX-License-Identifier: MIT

//! Graph workflow type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rag::state::Citation;

/// The steps the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Route,
    Retrieve,
    Compress,
    Generate,
    VerifyGrounding,
    VerifyUsefulness,
    Rewrite,
}

impl StepName {
    pub const ALL: [StepName; 7] = [
        StepName::Route,
        StepName::Retrieve,
        StepName::Compress,
        StepName::Generate,
        StepName::VerifyGrounding,
        StepName::VerifyUsefulness,
        StepName::Rewrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Route => "route",
            StepName::Retrieve => "retrieve",
            StepName::Compress => "compress",
            StepName::Generate => "generate",
            StepName::VerifyGrounding => "verify_grounding",
            StepName::VerifyUsefulness => "verify_usefulness",
            StepName::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepName::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step: {}", s))
    }
}

/// Where an edge leads. Written as a step name or `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    Step(StepName),
    /// Terminal: the turn is committed
    End,
}

impl TryFrom<String> for Target {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "end" | "END" => Ok(Target::End),
            other => other.parse().map(Target::Step),
        }
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::Step(step) => step.as_str().to_string(),
            Target::End => "end".to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Step(step) => write!(f, "{}", step),
            Target::End => write!(f, "END"),
        }
    }
}

/// An uncompiled transition, as written in code or YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: StepName,
    pub to: Target,
    /// Condition for taking this edge; edges are tried in declaration order
    #[serde(default)]
    pub when: Option<String>,
}

impl EdgeDef {
    pub fn always(from: StepName, to: Target) -> Self {
        Self {
            from,
            to,
            when: None,
        }
    }

    pub fn when(from: StepName, to: Target, condition: impl Into<String>) -> Self {
        Self {
            from,
            to,
            when: Some(condition.into()),
        }
    }
}

/// Loop bounds for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Rewrite → retrieve cycles allowed per turn
    pub max_rewrites: u32,
    /// Regenerations after a hallucination verdict allowed per turn
    pub max_regenerations: u32,
    /// Hard cap on steps executed in one turn
    pub max_steps: u32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_rewrites: 2,
            max_regenerations: 3,
            max_steps: 64,
        }
    }
}

/// Progress notifications for streaming callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    StepStarted {
        step: StepName,
    },
    StepCompleted {
        step: StepName,
    },
    Answer {
        answer: String,
        citations: Vec<Citation>,
        trace: Vec<StepName>,
        low_confidence: bool,
        durable: bool,
    },
    Error {
        message: String,
        step: Option<String>,
        retry_safe: bool,
    },
}
