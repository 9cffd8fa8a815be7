//! Local credit risk assessment

use super::extract::{
    amount_value, credit_score_from_text, debt_from_text, income_from_text, number_field,
    round2, string_field,
};
use crate::agent::response::parse_json_lenient;
use serde_json::{json, Map, Value};

pub const CREDIT_RISK_AGENT: &str = "CreditRiskAgent";

const INCOME_FIELDS: &[&str] = &["annual_income", "income", "yearly_income", "gross_income"];
const DEBT_FIELDS: &[&str] = &["monthly_debt", "debt", "monthly_payments", "total_debt"];
const CREDIT_FIELDS: &[&str] = &["credit_score", "fico_score", "credit_rating"];

/// Loan-to-value assumed when loan or property value is unknown
const DEFAULT_LTV: f64 = 80.0;

/// Applicant figures the assessment works from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialMetrics {
    pub applicant_name: String,
    pub annual_income: f64,
    pub monthly_debt: f64,
    pub credit_score: f64,
    pub loan_amount: f64,
    pub property_value: f64,
}

impl FinancialMetrics {
    /// Read figures from structured data, falling back to `extracted_data`
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let extracted = map.get("extracted_data").and_then(Value::as_object);

        let monthly_debt = number_field(map, DEBT_FIELDS)
            .or_else(|| extracted.and_then(|e| number_field(e, &["monthly_debt"])))
            .unwrap_or(0.0);

        Self {
            applicant_name: string_field(map, &["applicant_name", "name"])
                .unwrap_or_else(|| "Unknown".to_string()),
            annual_income: number_field(map, INCOME_FIELDS).unwrap_or(0.0),
            monthly_debt,
            credit_score: number_field(map, CREDIT_FIELDS).unwrap_or(0.0),
            loan_amount: number_field(map, &["loan_amount"]).unwrap_or(0.0),
            property_value: number_field(map, &["property_value"]).unwrap_or(0.0),
        }
    }

    /// Regex extraction from free text
    pub fn from_text(text: &str) -> Self {
        Self {
            applicant_name: "Unknown".to_string(),
            annual_income: income_from_text(text).unwrap_or(0.0),
            monthly_debt: debt_from_text(text).unwrap_or(0.0),
            credit_score: credit_score_from_text(text).unwrap_or(0.0),
            ..Self::default()
        }
    }

    /// Structured data if the text is a JSON object, otherwise regex extraction
    pub fn from_input_text(text: &str) -> Self {
        match parse_json_lenient(text) {
            Some(Value::Object(map)) => Self::from_map(&map),
            _ => Self::from_text(text),
        }
    }

    /// Monthly debt over monthly income, as a percentage; 100 with no income
    pub fn debt_to_income(&self) -> f64 {
        if self.annual_income > 0.0 {
            self.monthly_debt / (self.annual_income / 12.0) * 100.0
        } else {
            100.0
        }
    }

    pub fn loan_to_value(&self) -> f64 {
        if self.loan_amount > 0.0 && self.property_value > 0.0 {
            self.loan_amount / self.property_value * 100.0
        } else {
            DEFAULT_LTV
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 50 => RiskLevel::High,
            s if s >= 25 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Run the risk stage over structured input
pub fn risk_stage_from_map(map: &Map<String, Value>) -> Map<String, Value> {
    assess(&FinancialMetrics::from_map(map))
}

/// Run the risk stage over text input
pub fn risk_stage_from_text(text: &str) -> Map<String, Value> {
    assess(&FinancialMetrics::from_input_text(text))
}

/// Score an applicant
pub fn assess(metrics: &FinancialMetrics) -> Map<String, Value> {
    let dti = metrics.debt_to_income();
    let ltv = metrics.loan_to_value();
    let mut risk_factors = Vec::new();
    let mut score: u32 = 0;

    let credit = metrics.credit_score;
    if credit <= 0.0 {
        risk_factors.push("No credit score provided".to_string());
        score += 30;
    } else if credit < 580.0 {
        risk_factors.push("Poor credit score (below 580)".to_string());
        score += 40;
    } else if credit < 620.0 {
        risk_factors.push("Fair credit score (580-619)".to_string());
        score += 25;
    } else if credit < 670.0 {
        risk_factors.push("Good credit score (620-669)".to_string());
        score += 10;
    } else if credit < 740.0 {
        score += 5;
    }

    if dti > 43.0 {
        risk_factors.push(format!("High debt-to-income ratio ({dti:.1}%)"));
        score += 25;
    } else if dti > 36.0 {
        risk_factors.push(format!("Elevated debt-to-income ratio ({dti:.1}%)"));
        score += 15;
    }

    let income = metrics.annual_income;
    if income < 30_000.0 {
        risk_factors.push("Low annual income (below $30,000)".to_string());
        score += 20;
    } else if income < 50_000.0 {
        risk_factors.push("Moderate annual income ($30,000-$49,999)".to_string());
        score += 10;
    }

    let level = RiskLevel::from_score(score);

    let mut recommendations = Vec::new();
    if credit < 620.0 {
        recommendations.push("Consider credit improvement strategies before application");
    }
    if dti > 43.0 {
        recommendations.push("Reduce monthly debt obligations to improve DTI ratio");
    }
    if income < 50_000.0 {
        recommendations.push("Consider co-signer or additional income sources");
    }
    if recommendations.is_empty() {
        recommendations.push("Applicant meets basic credit criteria");
    }

    let mut confidence: f64 = 0.7;
    if credit > 0.0 {
        confidence += 0.2;
    }
    if income > 0.0 {
        confidence += 0.1;
    }

    let result = json!({
        "applicant_name": metrics.applicant_name,
        "credit_score": amount_value(credit),
        "credit_score_estimate": amount_value(credit),
        "risk_level": level.as_str(),
        "risk_score": score.min(100),
        "confidence": round2(confidence.min(1.0)),
        "debt_to_income_ratio": round2(dti),
        "loan_to_value_ratio": round2(ltv),
        "annual_income": amount_value(income),
        "monthly_debt": amount_value(metrics.monthly_debt),
        "risk_factors": risk_factors,
        "recommendations": recommendations,
        "metrics": {
            "debt_to_income_ratio": round2(dti),
            "loan_to_value_ratio": round2(ltv),
            "credit_score": amount_value(credit),
            "annual_income": amount_value(income),
            "monthly_debt": amount_value(metrics.monthly_debt),
            "loan_amount": amount_value(metrics.loan_amount),
        },
        "agent": CREDIT_RISK_AGENT,
    });

    match result {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
