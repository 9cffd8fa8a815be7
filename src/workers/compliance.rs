//! Local regulatory compliance check

use super::credit_risk::FinancialMetrics;
use super::extract::{amount_value, number_field, round2};
use crate::agent::response::parse_json_lenient;
use serde_json::{json, Map, Value};

pub const COMPLIANCE_AGENT: &str = "ComplianceAgent";

/// Conventional lending thresholds
const MIN_CREDIT_SCORE: f64 = 620.0;
const PREFERRED_CREDIT_SCORE: f64 = 740.0;
const MAX_DTI: f64 = 43.0;
const ELEVATED_DTI: f64 = 36.0;
const MIN_INCOME: f64 = 30_000.0;

#[derive(Debug, Clone, PartialEq)]
struct ComplianceFigures {
    credit_score: f64,
    annual_income: f64,
    monthly_debt: f64,
    loan_amount: f64,
    debt_to_income: f64,
}

impl ComplianceFigures {
    /// Accepts a risk assessment, a document extraction, or both nested together
    fn from_map(map: &Map<String, Value>) -> Self {
        if let (Some(risk), Some(document)) = (
            map.get("risk_assessment").and_then(Value::as_object),
            map.get("document_data").and_then(Value::as_object),
        ) {
            let mut merged = document.clone();
            merged.extend(risk.clone());
            return Self::from_flat(&merged);
        }
        Self::from_flat(map)
    }

    fn from_flat(map: &Map<String, Value>) -> Self {
        let metrics = FinancialMetrics::from_map(map);
        let debt_to_income = number_field(map, &["debt_to_income_ratio"])
            .unwrap_or_else(|| computed_dti(&metrics));

        Self {
            credit_score: metrics.credit_score,
            annual_income: metrics.annual_income,
            monthly_debt: metrics.monthly_debt,
            loan_amount: metrics.loan_amount,
            debt_to_income,
        }
    }

    fn from_text(text: &str) -> Self {
        let metrics = FinancialMetrics::from_text(text);
        Self {
            credit_score: metrics.credit_score,
            annual_income: metrics.annual_income,
            monthly_debt: metrics.monthly_debt,
            loan_amount: metrics.loan_amount,
            debt_to_income: computed_dti(&metrics),
        }
    }
}

/// DTI for compliance purposes; zero income yields zero and is caught by the income check
fn computed_dti(metrics: &FinancialMetrics) -> f64 {
    if metrics.annual_income > 0.0 {
        metrics.monthly_debt / (metrics.annual_income / 12.0) * 100.0
    } else {
        0.0
    }
}

/// Run the compliance stage over structured input
pub fn compliance_stage_from_map(map: &Map<String, Value>) -> Map<String, Value> {
    check(&ComplianceFigures::from_map(map))
}

/// Run the compliance stage over text input
pub fn compliance_stage_from_text(text: &str) -> Map<String, Value> {
    match parse_json_lenient(text) {
        Some(Value::Object(map)) => compliance_stage_from_map(&map),
        _ => check(&ComplianceFigures::from_text(text)),
    }
}

fn check(figures: &ComplianceFigures) -> Map<String, Value> {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    let dti = figures.debt_to_income;

    if figures.credit_score < MIN_CREDIT_SCORE {
        issues.push("Credit score below conventional lending minimum (620)".to_string());
        recommendations.push("Consider FHA loan options or credit improvement strategies");
    } else if figures.credit_score < PREFERRED_CREDIT_SCORE {
        recommendations.push("Credit score could be improved for better rates");
    }

    if dti > MAX_DTI {
        issues.push(format!(
            "Debt-to-income ratio ({dti:.1}%) exceeds recommended maximum (43%)"
        ));
        recommendations.push("Consider debt reduction or lower loan amount");
    } else if dti > ELEVATED_DTI {
        recommendations.push("DTI ratio is acceptable but on the higher side");
    }

    if figures.annual_income < MIN_INCOME {
        issues.push("Annual income may be insufficient for mortgage qualification".to_string());
        recommendations.push("Verify income documentation and consider co-signer");
    }

    let approved = issues.is_empty() && figures.credit_score >= MIN_CREDIT_SCORE && dti <= MAX_DTI;
    let confidence = if approved { 0.85 } else { 0.65 };
    let summary = if approved {
        "Application meets conventional lending guidelines".to_string()
    } else {
        format!("{} compliance issue(s) identified", issues.len())
    };

    let result = json!({
        "approved": approved,
        "confidence": confidence,
        "compliance_issues": issues,
        "recommendations": recommendations,
        "metrics": {
            "credit_score": amount_value(figures.credit_score),
            "debt_to_income_ratio": round2(dti),
            "annual_income": amount_value(figures.annual_income),
            "monthly_debt": amount_value(figures.monthly_debt),
            "loan_amount": amount_value(figures.loan_amount),
        },
        "summary": summary,
        "agent": COMPLIANCE_AGENT,
    });

    match result {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_low_risk_assessment_is_approved() {
        let result = compliance_stage_from_map(&map(json!({
            "credit_score": 720,
            "annual_income": 80000,
            "monthly_debt": 0,
            "debt_to_income_ratio": 0.0,
            "risk_level": "low"
        })));

        assert_eq!(result["approved"], true);
        assert_eq!(result["confidence"], 0.85);
        assert!(result["compliance_issues"].as_array().unwrap().is_empty());
        assert_eq!(
            result["recommendations"][0],
            "Credit score could be improved for better rates"
        );
    }

    #[test]
    fn test_provided_dti_takes_precedence() {
        let result = compliance_stage_from_map(&map(json!({
            "credit_score": 760,
            "annual_income": 120000,
            "monthly_debt": 100,
            "debt_to_income_ratio": 47.5
        })));

        assert_eq!(result["approved"], false);
        assert_eq!(result["metrics"]["debt_to_income_ratio"], 47.5);
        assert!(result["compliance_issues"][0]
            .as_str()
            .unwrap()
            .contains("47.5%"));
    }

    #[test]
    fn test_nested_input_merges_risk_over_document() {
        let result = compliance_stage_from_map(&map(json!({
            "document_data": {"income": 45000, "credit_score": 600, "loan_amount": 250000},
            "risk_assessment": {"credit_score": 700, "debt_to_income_ratio": 20.0}
        })));

        assert_eq!(result["metrics"]["credit_score"], 700);
        assert_eq!(result["metrics"]["annual_income"], 45000);
        assert_eq!(result["metrics"]["loan_amount"], 250000);
        assert_eq!(result["approved"], true);
    }

    #[test]
    fn test_text_input_without_figures_is_rejected() {
        let result = compliance_stage_from_text("Check regulatory compliance for this loan");

        assert_eq!(result["approved"], false);
        assert_eq!(result["confidence"], 0.65);
        assert_eq!(result["compliance_issues"].as_array().unwrap().len(), 2);
        assert_eq!(result["summary"], "2 compliance issue(s) identified");
        assert_eq!(result["agent"], COMPLIANCE_AGENT);
    }

    #[test]
    fn test_text_input_with_figures() {
        let result = compliance_stage_from_text(
            "Check compliance for applicant with 95000 income, 700 credit score and 1500 monthly debt",
        );
        assert_eq!(result["approved"], true);
        assert_eq!(result["metrics"]["monthly_debt"], 1500);
    }
}
