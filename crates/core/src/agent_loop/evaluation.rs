//! Parsing of evaluator responses.

use serde::Deserialize;

/// The evaluator's judgement of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    Accept(String),
    Reject(String),
}

#[derive(Deserialize)]
struct RawAssessment {
    status: String,
    #[serde(default)]
    feedback: String,
}

const ACCEPTING: &[&str] = &[
    "accept",
    "accepted",
    "approve",
    "approved",
    "pass",
    "passed",
    "complete",
    "completed",
];

/// Parse `{"status": ..., "feedback": ...}` out of an evaluator response.
///
/// Anything that cannot be read as an accepting status is a rejection, so an
/// unparseable answer never lets an attempt through.
pub fn parse_assessment(text: &str) -> Assessment {
    let trimmed = text.trim();
    let body = crate::agent_loop::todo::fenced_block(trimmed).unwrap_or(trimmed);
    let object = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };

    match serde_json::from_str::<RawAssessment>(object) {
        Ok(raw) => {
            let status = raw.status.trim().to_lowercase();
            if ACCEPTING.contains(&status.as_str()) {
                Assessment::Accept(raw.feedback)
            } else if raw.feedback.trim().is_empty() {
                Assessment::Reject(format!("evaluator returned status '{status}'"))
            } else {
                Assessment::Reject(raw.feedback)
            }
        }
        Err(_) if trimmed.is_empty() => {
            Assessment::Reject("evaluator returned nothing".to_string())
        }
        Err(_) => Assessment::Reject(format!("evaluator response could not be parsed: {trimmed}")),
    }
}
