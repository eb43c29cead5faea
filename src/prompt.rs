//! Prompt assembly.
//!
//! Turns a query, its retrieved chunks and the recent conversation into the
//! ordered message list sent to the chat model:
//!
//! 1. a system turn with the Asha persona plus a context-type addendum,
//! 2. the last [`HISTORY_WINDOW`] history turns, verbatim,
//! 3. a final user turn carrying the retrieved context and the question.
//!
//! Pure: no I/O, no network.

use std::fmt;

use crate::models::{ConversationTurn, RetrievedChunk};

/// Number of prior turns carried into the prompt.
pub const HISTORY_WINDOW: usize = 5;

const BASE_PERSONA: &str = "You are Asha, an AI-powered mentor designed to assist Indian women in career development, \
job opportunities, entrepreneurship, financial literacy, government schemes, and digital empowerment.

Your responses should be:
- Detailed and Comprehensive: Provide in-depth information about opportunities, processes, and resources.
- Simple and Clear: Use easy-to-understand language suitable for users with varying education levels.
- Structured and Informative: Provide details in a step-by-step manner for clarity.
- Supportive and Encouraging: Offer practical guidance with a positive and respectful tone.
- Actionable: Include all necessary details such as eligibility criteria, requirements, application processes, and benefits.
- Culturally Appropriate: Consider the cultural context of Indian women when providing advice.
- Gender-inclusive: Avoid gender stereotypes and biases in all responses.
";

const JOBS_ADDENDUM: &str = "Focus on providing information about job opportunities, application processes, \
interview preparation, and career guidance for women.";

const EVENTS_ADDENDUM: &str = "Focus on providing information about upcoming events, workshops, and \
community programs that would benefit women's career development.";

const MENTORSHIP_ADDENDUM: &str = "Focus on providing information about mentorship programs, networking \
opportunities, and professional development resources for women.";

const SCHEMES_ADDENDUM: &str = "Focus on providing information about government schemes, subsidies, \
and programs designed to support women entrepreneurs.";

/// Topic focus requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextType {
    #[default]
    All,
    Jobs,
    Events,
    Mentorship,
    Schemes,
}

impl ContextType {
    /// Parse a client-supplied context type. Unknown values fall back to
    /// [`ContextType::All`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "jobs" => ContextType::Jobs,
            "events" => ContextType::Events,
            "mentorship" => ContextType::Mentorship,
            "schemes" => ContextType::Schemes,
            "all" => ContextType::All,
            other => {
                tracing::debug!(context_type = other, "unknown context type, using base persona");
                ContextType::All
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::All => "all",
            ContextType::Jobs => "jobs",
            ContextType::Events => "events",
            ContextType::Mentorship => "mentorship",
            ContextType::Schemes => "schemes",
        }
    }

    fn addendum(&self) -> Option<&'static str> {
        match self {
            ContextType::All => None,
            ContextType::Jobs => Some(JOBS_ADDENDUM),
            ContextType::Events => Some(EVENTS_ADDENDUM),
            ContextType::Mentorship => Some(MENTORSHIP_ADDENDUM),
            ContextType::Schemes => Some(SCHEMES_ADDENDUM),
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn system_prompt(context_type: ContextType) -> String {
    match context_type.addendum() {
        Some(addendum) => format!("{}\n{}\n", BASE_PERSONA, addendum),
        None => BASE_PERSONA.to_string(),
    }
}

/// The final user turn's content.
pub fn user_message(query: &str, context: &[RetrievedChunk]) -> String {
    if context.is_empty() {
        return query.to_string();
    }
    let joined = context
        .iter()
        .map(|rc| rc.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Context information (use this to formulate your answer):\n{}\n\nUser question: {}\n\nProvide a comprehensive, detailed response with all available information on the topic.",
        joined, query
    )
}

/// Build the message sequence for one model call.
///
/// `history` holds the turns that preceded `query`; only the most recent
/// [`HISTORY_WINDOW`] are kept.
pub fn assemble(
    query: &str,
    context: &[RetrievedChunk],
    history: &[ConversationTurn],
    context_type: ContextType,
) -> Vec<ConversationTurn> {
    let window = &history[history.len().saturating_sub(HISTORY_WINDOW)..];

    let mut turns = Vec::with_capacity(window.len() + 2);
    turns.push(ConversationTurn::system(system_prompt(context_type)));
    turns.extend(window.iter().cloned());
    turns.push(ConversationTurn::user(user_message(query, context)));
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Role};

    fn retrieved(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: text.to_string(),
                origin: "doc.txt".to_string(),
                unit: 0,
                seq: 0,
                text: text.to_string(),
                hash: String::new(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn test_jobs_adds_focus_line() {
        let turns = assemble("Find jobs", &[], &[], ContextType::parse("jobs"));
        assert_eq!(turns[0].role, Role::System);
        assert!(turns[0].content.starts_with(BASE_PERSONA));
        assert!(turns[0].content.contains(JOBS_ADDENDUM));
    }

    #[test]
    fn test_unknown_context_type_uses_base_only() {
        assert_eq!(ContextType::parse("astrology"), ContextType::All);
        let turns = assemble("hello", &[], &[], ContextType::parse("astrology"));
        assert_eq!(turns[0].content, BASE_PERSONA);
    }

    #[test]
    fn test_history_limited_to_window() {
        let history: Vec<ConversationTurn> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationTurn::user(format!("q{}", i))
                } else {
                    ConversationTurn::assistant(format!("a{}", i))
                }
            })
            .collect();
        let turns = assemble("now", &[], &history, ContextType::All);
        assert_eq!(turns.len(), 1 + HISTORY_WINDOW + 1);
        assert_eq!(turns[1].content, "a3");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[HISTORY_WINDOW].content, "a7");
    }

    #[test]
    fn test_no_context_sends_raw_query() {
        let turns = assemble("What is MUDRA?", &[], &[], ContextType::All);
        assert_eq!(turns.last().unwrap(), &ConversationTurn::user("What is MUDRA?"));
    }

    #[test]
    fn test_context_precedes_query() {
        let context = vec![retrieved("Stand Up India offers loans"), retrieved("MUDRA loans up to 10 lakh")];
        let turns = assemble("Which schemes give loans?", &context, &[], ContextType::Schemes);
        let last = &turns.last().unwrap().content;

        let first = last.find("Stand Up India").unwrap();
        let second = last.find("MUDRA loans").unwrap();
        let question = last.find("User question: Which schemes give loans?").unwrap();
        assert!(first < second && second < question);
        assert!(last.starts_with("Context information (use this to formulate your answer):\n"));
    }
}
