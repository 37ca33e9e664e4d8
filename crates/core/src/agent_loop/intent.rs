//! Intent classification.
//!
//! Decides, without calling a model, whether an instruction asks a question
//! (answered directly) or asks for a change (planned and executed).

use ledit_protocol::AgentSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// A question or request for explanation. No files change.
    Question,
    /// Anything that implies changing the workspace.
    Edit,
}

const POLITE_PREFIXES: &[&str] = &["please ", "can you ", "could you ", "would you ", "will you "];

const EDIT_VERBS: &[&str] = &[
    "add", "build", "change", "create", "delete", "fix", "generate", "implement", "make",
    "migrate", "modify", "move", "refactor", "remove", "rename", "replace", "rewrite", "run",
    "set up", "setup", "update", "upgrade", "write",
];

const QUESTION_STARTERS: &[&str] = &[
    "what", "how", "why", "where", "when", "which", "who", "is ", "are ", "does ", "do ",
    "explain", "describe", "tell me", "summarize", "list ", "show me",
];

const QUESTION_PHRASES: &[&str] = &[
    "what is",
    "what are",
    "what does",
    "how do",
    "how does",
    "can you explain",
    "explain how",
    "explain why",
];

/// Classify an instruction.
pub fn classify(instruction: &str) -> Intent {
    let lowered = instruction.trim().to_lowercase();
    if lowered.is_empty() {
        return Intent::Edit;
    }

    if QUESTION_PHRASES.iter().any(|phrase| lowered.starts_with(phrase)) {
        return Intent::Question;
    }

    let mut request = lowered.as_str();
    while let Some(rest) = POLITE_PREFIXES
        .iter()
        .find_map(|prefix| request.strip_prefix(prefix))
    {
        request = rest;
    }

    if EDIT_VERBS.iter().any(|verb| starts_with_word(request, verb)) {
        return Intent::Edit;
    }

    if QUESTION_STARTERS
        .iter()
        .any(|starter| request.starts_with(starter))
        || lowered.ends_with('?')
    {
        return Intent::Question;
    }

    Intent::Edit
}

/// Classify an instruction for an agent. The agent's `intent` config flag,
/// when set to `question` or `edit`, wins over the heuristics.
pub fn classify_for(agent: &AgentSpec, instruction: &str) -> Intent {
    match agent.config.get("intent").map(|value| value.trim().to_lowercase()) {
        Some(value) if value == "question" => Intent::Question,
        Some(value) if value == "edit" => Intent::Edit,
        _ => classify(instruction),
    }
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(|c: char| !c.is_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_questions() {
        assert_eq!(classify("What is the purpose of main.go?"), Intent::Question);
        assert_eq!(classify("how does the scheduler pick steps"), Intent::Question);
        assert_eq!(classify("Can you explain the retry logic?"), Intent::Question);
        assert_eq!(classify("Explain the config loader"), Intent::Question);
        assert_eq!(classify("Is the cache thread safe?"), Intent::Question);
        assert_eq!(classify("the build is slow?"), Intent::Question);
    }

    #[test]
    fn test_edits() {
        assert_eq!(classify("Create a REST endpoint for users"), Intent::Edit);
        assert_eq!(classify("Please add tests for the parser"), Intent::Edit);
        assert_eq!(classify("can you fix the failing test?"), Intent::Edit);
        assert_eq!(classify("Implement login"), Intent::Edit);
        assert_eq!(classify("Backend API with CRUD operations"), Intent::Edit);
        assert_eq!(classify(""), Intent::Edit);
    }

    #[test]
    fn test_verb_must_be_a_whole_word() {
        assert_eq!(classify("Address book export"), Intent::Edit);
        assert_eq!(classify("Runtime overview?"), Intent::Question);
    }

    #[test]
    fn test_agent_override() {
        let mut agent = AgentSpec {
            id: "a".to_string(),
            name: String::new(),
            persona: String::new(),
            description: String::new(),
            skills: Vec::new(),
            model: None,
            priority: 100,
            depends_on: Vec::new(),
            config: Default::default(),
            budget: None,
        };
        assert_eq!(classify_for(&agent, "What is X?"), Intent::Question);

        agent.config.insert("intent".to_string(), "edit".to_string());
        assert_eq!(classify_for(&agent, "What is X?"), Intent::Edit);

        agent.config.insert("intent".to_string(), "Question".to_string());
        assert_eq!(classify_for(&agent, "Create X"), Intent::Question);
    }
}
