//! Heuristic feedback classification.
//!
//! Lexicon matching over user messages. These are routing hints, not
//! semantic guarantees: the classifier decides which workflow path handles
//! a message, and the revision loop re-reads the full text anyway.

use serde::{Deserialize, Serialize};

/// What kind of feedback a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackKind {
    /// Asks for a concrete change.
    ChangeRequest,
    /// States a preference.
    Preference,
    /// Proposes an idea.
    Suggestion,
    /// Asks a question.
    Question,
    /// Expresses approval.
    Approval,
    /// Expresses rejection.
    Rejection,
    /// Reports a defect.
    BugReport,
    /// Asks for clarification of the document itself.
    Clarification,
    /// None of the above.
    Other,
}

/// Coarse sentiment from polarity word counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    /// More positive than negative markers.
    Positive,
    /// Balanced or no markers.
    Neutral,
    /// More negative than positive markers.
    Negative,
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackClassification {
    /// The routed kind.
    pub kind: FeedbackKind,
    /// Coarse sentiment.
    pub sentiment: Sentiment,
    /// Whether the message should enter the revision loop at all.
    pub is_feedback: bool,
}

const CHANGE_MARKERS: [&str; 8] = [
    "change", "update", "modify", "replace", "remove", "rename", "instead", "rewrite",
];
const PREFERENCE_MARKERS: [&str; 5] = ["prefer", "rather", "i'd like", "i would like", "favorite"];
const SUGGESTION_MARKERS: [&str; 6] = [
    "suggest",
    "what about",
    "how about",
    "consider",
    "maybe add",
    "could we",
];
const QUESTION_MARKERS: [&str; 5] = ["?", "why ", "how ", "what ", "when "];
const APPROVAL_MARKERS: [&str; 5] = ["approved", "approve", "accept", "looks good", "lgtm"];
const REJECTION_MARKERS: [&str; 5] = ["reject", "not acceptable", "start over", "wrong direction", "denied"];
const BUG_MARKERS: [&str; 6] = ["bug", "broken", "error", "crash", "doesn't work", "does not work"];
const CLARIFICATION_MARKERS: [&str; 4] = ["unclear", "confusing", "clarify", "ambiguous"];

const POSITIVE_WORDS: [&str; 8] = [
    "good", "great", "excellent", "nice", "love", "perfect", "well", "solid",
];
const NEGATIVE_WORDS: [&str; 8] = [
    "bad", "wrong", "poor", "hate", "terrible", "broken", "confusing", "missing",
];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Classifies a user message. Kind precedence runs from the strongest
/// signals (rejection, bug) down to the weakest (question).
pub fn classify_feedback(message: &str) -> FeedbackClassification {
    let text = message.to_lowercase();

    let kind = if contains_any(&text, &REJECTION_MARKERS) {
        FeedbackKind::Rejection
    } else if contains_any(&text, &BUG_MARKERS) {
        FeedbackKind::BugReport
    } else if contains_any(&text, &APPROVAL_MARKERS) {
        FeedbackKind::Approval
    } else if contains_any(&text, &CHANGE_MARKERS) {
        FeedbackKind::ChangeRequest
    } else if contains_any(&text, &CLARIFICATION_MARKERS) {
        FeedbackKind::Clarification
    } else if contains_any(&text, &SUGGESTION_MARKERS) {
        FeedbackKind::Suggestion
    } else if contains_any(&text, &PREFERENCE_MARKERS) {
        FeedbackKind::Preference
    } else if contains_any(&text, &QUESTION_MARKERS) {
        FeedbackKind::Question
    } else {
        FeedbackKind::Other
    };

    let positive = POSITIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
    let sentiment = if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };

    FeedbackClassification {
        kind,
        sentiment,
        is_feedback: kind != FeedbackKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_request() {
        let c = classify_feedback("Please change the onboarding section to mention SSO");
        assert_eq!(c.kind, FeedbackKind::ChangeRequest);
        assert!(c.is_feedback);
    }

    #[test]
    fn test_bug_report_beats_change_request() {
        let c = classify_feedback("The export is broken, please change it");
        assert_eq!(c.kind, FeedbackKind::BugReport);
        assert_eq!(c.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_rejection_has_highest_precedence() {
        let c = classify_feedback("Reject this, the error handling section is broken");
        assert_eq!(c.kind, FeedbackKind::Rejection);
    }

    #[test]
    fn test_approval() {
        let c = classify_feedback("Looks good, approved!");
        assert_eq!(c.kind, FeedbackKind::Approval);
        assert_eq!(c.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_question() {
        let c = classify_feedback("Does this cover offline mode?");
        assert_eq!(c.kind, FeedbackKind::Question);
    }

    #[test]
    fn test_suggestion_and_preference() {
        assert_eq!(
            classify_feedback("What about adding dark mode to the design?").kind,
            FeedbackKind::Suggestion
        );
        assert_eq!(
            classify_feedback("I'd like the dashboard first").kind,
            FeedbackKind::Preference
        );
    }

    #[test]
    fn test_clarification() {
        assert_eq!(
            classify_feedback("The pricing section is unclear").kind,
            FeedbackKind::Clarification
        );
    }

    #[test]
    fn test_other_is_not_feedback() {
        let c = classify_feedback("thanks");
        assert_eq!(c.kind, FeedbackKind::Other);
        assert!(!c.is_feedback);
        assert_eq!(c.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&FeedbackKind::ChangeRequest).unwrap(),
            "\"CHANGE_REQUEST\""
        );
        assert_eq!(
            serde_json::to_string(&FeedbackKind::BugReport).unwrap(),
            "\"BUG_REPORT\""
        );
    }
}
