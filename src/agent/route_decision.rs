//! Route labels chosen by the classifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of routes a request can take through the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
    DocumentOnly,
    RiskOnly,
    ComplianceOnly,
    #[default]
    FullPipeline,
}

impl RouteLabel {
    pub const ALL: [RouteLabel; 4] = [
        RouteLabel::DocumentOnly,
        RouteLabel::RiskOnly,
        RouteLabel::ComplianceOnly,
        RouteLabel::FullPipeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::DocumentOnly => "document_only",
            RouteLabel::RiskOnly => "risk_only",
            RouteLabel::ComplianceOnly => "compliance_only",
            RouteLabel::FullPipeline => "full_pipeline",
        }
    }

    /// Exact label match
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == label)
    }

    /// Normalize free-form model output and match it against the label set
    ///
    /// Surrounding whitespace, quotes, backticks and a trailing period are
    /// stripped and case is ignored. Anything else returns `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw
            .trim()
            .trim_end_matches('.')
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim()
            .trim_end_matches('.')
            .to_lowercase();
        Self::from_label(&trimmed)
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_labels_round_trip_through_serde() {
        for label in RouteLabel::ALL {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
            let back: RouteLabel = serde_json::from_str(&json).unwrap();
            assert_eq!(back, label);
        }
    }

    #[test]
    fn test_normalize_accepts_decorated_output() {
        assert_eq!(RouteLabel::normalize("risk_only"), Some(RouteLabel::RiskOnly));
        assert_eq!(
            RouteLabel::normalize("  \"Compliance_Only\" \n"),
            Some(RouteLabel::ComplianceOnly)
        );
        assert_eq!(
            RouteLabel::normalize("`document_only`."),
            Some(RouteLabel::DocumentOnly)
        );
        assert_eq!(
            RouteLabel::normalize("'risk_only.'"),
            Some(RouteLabel::RiskOnly)
        );
        assert_eq!(
            RouteLabel::normalize("FULL_PIPELINE"),
            Some(RouteLabel::FullPipeline)
        );
    }

    #[test]
    fn test_normalize_rejects_other_text() {
        assert_eq!(RouteLabel::normalize(""), None);
        assert_eq!(RouteLabel::normalize("risk"), None);
        assert_eq!(
            RouteLabel::normalize("I think risk_only is best"),
            None
        );
    }

    #[test]
    fn test_default_is_full_pipeline() {
        assert_eq!(RouteLabel::default(), RouteLabel::FullPipeline);
    }

    proptest! {
        #[test]
        fn normalize_never_yields_label_for_non_label_words(s in "[a-z ]{0,30}") {
            let expected = RouteLabel::from_label(s.trim());
            prop_assert_eq!(RouteLabel::normalize(&s), expected);
        }

        #[test]
        fn normalize_is_case_insensitive(idx in 0usize..4, upper in proptest::bool::ANY) {
            let label = RouteLabel::ALL[idx];
            let text = if upper { label.as_str().to_uppercase() } else { label.as_str().to_string() };
            prop_assert_eq!(RouteLabel::normalize(&text), Some(label));
        }
    }
}
