// SPDX-License-Identifier: MIT

//! Mapping free-text model output onto typed decisions

use crate::rag::state::Route;

/// `conversational` selects the direct path; anything else is research
pub fn parse_route(raw: &str) -> Route {
    let label = raw
        .trim()
        .to_lowercase()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
        .to_string();
    if label == "conversational" {
        Route::Conversational
    } else {
        Route::Research
    }
}

/// True when the output contains the word `yes`
pub fn says_yes(raw: &str) -> bool {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        assert_eq!(parse_route("conversational"), Route::Conversational);
        assert_eq!(parse_route("  'Conversational'.\n"), Route::Conversational);
        assert_eq!(parse_route("vectorstore"), Route::Research);
        assert_eq!(parse_route("research"), Route::Research);
        assert_eq!(parse_route(""), Route::Research);
        assert_eq!(parse_route("conversational or research"), Route::Research);
    }

    #[test]
    fn test_says_yes() {
        assert!(says_yes("yes"));
        assert!(says_yes("Yes."));
        assert!(says_yes("Answer: YES, it does"));
        assert!(!says_yes("no"));
        assert!(!says_yes("eyes wide shut"));
        assert!(!says_yes(""));
    }
}
