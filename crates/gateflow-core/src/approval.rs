//! Approval-phrase validation for gate reviews.
//!
//! Gate approval demands an explicit phrase. Polite acknowledgments like
//! "ok" are deliberately rejected so a casual reply can never approve a
//! gate by accident.

use crate::error::{FieldIssue, GateflowError, GateflowResult};

/// Tokens that make a response an explicit approval.
const ACCEPT_TOKENS: [&str; 4] = ["approved", "approve", "accept", "yes"];

/// Exact responses rejected as ambiguous acknowledgments.
const AMBIGUOUS_RESPONSES: [&str; 4] = ["ok", "sure", "fine", "alright"];

/// Classification of a review response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPhrase {
    /// Contains an explicit approval token.
    Approved,
    /// Exactly an ambiguous acknowledgment ("ok", "sure", …).
    Ambiguous,
    /// Anything else.
    Invalid,
}

/// Classifies a review response after normalization (trim + lowercase).
pub fn classify_approval(response: &str) -> ApprovalPhrase {
    let normalized = response.trim().to_lowercase();
    if AMBIGUOUS_RESPONSES.contains(&normalized.as_str()) {
        return ApprovalPhrase::Ambiguous;
    }
    if ACCEPT_TOKENS.iter().any(|t| normalized.contains(t)) {
        return ApprovalPhrase::Approved;
    }
    ApprovalPhrase::Invalid
}

/// Validates a review response, returning a coaching error unless it is an
/// explicit approval.
pub fn validate_approval(response: &str) -> GateflowResult<()> {
    match classify_approval(response) {
        ApprovalPhrase::Approved => Ok(()),
        ApprovalPhrase::Ambiguous => Err(GateflowError::invalid_fields(
            format!(
                "'{}' is an ambiguous acknowledgment, not an approval — \
                 please use 'approved' or 'yes'",
                response.trim()
            ),
            vec![FieldIssue::new(
                "approval_response",
                "ambiguous acknowledgment; explicit approval required",
            )],
        )),
        ApprovalPhrase::Invalid => Err(GateflowError::invalid_fields(
            "response is not an approval — please use 'approved' or 'yes'",
            vec![FieldIssue::new(
                "approval_response",
                "must contain one of: approved, approve, accept, yes",
            )],
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_approvals_accepted() {
        for phrase in ["approved", "yes", "approve", "accept", "Yes, approved!"] {
            assert_eq!(classify_approval(phrase), ApprovalPhrase::Approved, "{phrase}");
            assert!(validate_approval(phrase).is_ok());
        }
    }

    #[test]
    fn test_containment_counts_as_approval() {
        assert!(validate_approval("looks great, approved for launch").is_ok());
        assert!(validate_approval("  YES  ").is_ok());
    }

    #[test]
    fn test_ambiguous_acknowledgments_rejected() {
        for phrase in ["ok", "sure", "fine", "alright", " OK ", "Sure"] {
            assert_eq!(
                classify_approval(phrase),
                ApprovalPhrase::Ambiguous,
                "{phrase}"
            );
            let err = validate_approval(phrase).unwrap_err();
            assert!(err.to_string().contains("'approved' or 'yes'"));
        }
    }

    #[test]
    fn test_everything_else_invalid_with_coaching() {
        for phrase in ["", "no", "reject", "maybe later", "ship it"] {
            assert_eq!(classify_approval(phrase), ApprovalPhrase::Invalid, "{phrase}");
            let err = validate_approval(phrase).unwrap_err();
            assert!(err.to_string().contains("'approved' or 'yes'"));
        }
    }

    #[test]
    fn test_okay_is_not_exactly_ok() {
        // Only the exact acknowledgments are the ambiguous set; "okay" is
        // simply invalid.
        assert_eq!(classify_approval("okay"), ApprovalPhrase::Invalid);
    }
}
