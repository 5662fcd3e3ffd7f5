// SPDX-License-Identifier: MIT

//! Prompt templates for the built-in steps

use crate::rag::state::UserProfile;

pub fn route(question: &str, profile: &UserProfile) -> String {
    format!(
        r#"Route the user question.

User Profile: {profile}
Question: {question}

Paths:
- 'research': Technical questions about Bitcoin, blockchain, or document content
- 'conversational': Greetings, introductions, meta-questions about the AI

Answer only with the path name."#,
        profile = profile.to_json_string(),
        question = question,
    )
}

pub fn expansion(question: &str, count: usize) -> String {
    format!(
        r#"Generate {count} search queries for: "{question}"
Output {count} lines only."#
    )
}

pub fn compression(question: &str, documents: &str) -> String {
    format!(
        r#"Extract ONLY the sentences directly relevant to: "{question}"

Documents:
{documents}

Output only the relevant excerpts, separated by newlines."#
    )
}

pub fn generation(profile: &UserProfile, history: &str, context: &str, question: &str) -> String {
    format!(
        r#"You are a friendly technical expert.

[INSTRUCTIONS]
- Be warm and conversational for greetings
- For technical answers, weave facts naturally WITHOUT saying "Based on the context"
- When using specific facts from the context, add a citation like [1] after the fact
- NEVER mention "snippets" or "context" or your technical limitations

User Profile: {profile}

[Chat History]:
{history}

[Context]:
{context}

Question: {question}

Direct Response:"#,
        profile = profile.to_json_string(),
    )
}

pub fn grounding(context: &str, answer: &str) -> String {
    format!(
        r#"Does the answer contain FABRICATED facts (specific numbers, names, dates) NOT in the context?
Paraphrasing and natural language variation is OK.

Context: {context}
Answer: {answer}

Contains fabrications? (yes/no):"#
    )
}

pub fn usefulness(question: &str, answer: &str) -> String {
    format!(
        r#"Is this a reasonable response?
Q: {question}
A: {answer}
Acceptable? (yes/no):"#
    )
}

pub fn rewrite(question: &str) -> String {
    format!("Rewrite for better search: {question}")
}
