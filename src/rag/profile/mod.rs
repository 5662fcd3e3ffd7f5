// SPDX-License-Identifier: MIT

//! Long-term user profile storage
//!
//! - [memory] - process-local map
//! - [supabase] - `user_personas` table over PostgREST

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::adk::error::RagError;
use crate::rag::state::UserProfile;

pub use memory::MemoryProfileStore;
pub use supabase::SupabaseProfileStore;

/// Keyed by user id; an absent user has an empty profile
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<UserProfile, RagError>;

    async fn save(&self, user_id: &str, profile: &UserProfile) -> Result<(), RagError>;
}

static EXPLICIT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:my name is|call me)\s+([a-z][\w'-]*)").expect("valid regex")
});

// "I'm Sam" / "I am Sam": only a capitalised word counts as a name
static SELF_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[Ii](?:'m|’m| am)\s+([A-Z][\w'-]*)").expect("valid regex")
});

const NOT_NAMES: &[&str] = &[
    "A", "An", "The", "Not", "Just", "So", "Also", "Still", "Here", "Fine", "Good", "Great",
    "Sure", "Sorry", "Curious", "Interested", "Looking", "Trying", "Wondering", "New", "Back",
    "Later", "Anytime", "Whenever", "Unimportant",
];

/// Name the user gave for themselves, if the message is a self-introduction
pub fn detect_introduction(message: &str) -> Option<String> {
    EXPLICIT_NAME
        .captures_iter(message)
        .chain(SELF_REFERENCE.captures_iter(message))
        .map(|c| c[1].to_string())
        .find(|name| !is_stopword(name))
}

fn is_stopword(word: &str) -> bool {
    NOT_NAMES.iter().any(|w| w.eq_ignore_ascii_case(word))
}
