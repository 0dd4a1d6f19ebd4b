use crate::domain::aml::{AmlResult, AmlTier};
use crate::domain::score::{RiskTier, ScoreResult, SubScore, SubScores};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

/// Scoring service output as it appears on the wire. Keys follow the prompt's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmScoreResult {
    #[serde(rename = "總分")]
    pub total: f64,
    #[serde(rename = "風險等級")]
    pub risk_level: String,
    #[serde(rename = "評語")]
    pub comment: String,
    #[serde(rename = "細項評分")]
    pub sub_scores: LlmSubScores,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSubScores {
    #[serde(rename = "償債年限")]
    pub debt_service_years: f64,
    #[serde(rename = "EBITDA穩定性")]
    pub ebitda_stability: f64,
    #[serde(rename = "現金流償債能力")]
    pub cash_flow_coverage: f64,
    #[serde(rename = "利息保障倍數")]
    pub interest_coverage: f64,
    #[serde(rename = "資本支出效率")]
    pub capex_efficiency: f64,
    #[serde(rename = "流動比率")]
    pub current_ratio: f64,
    #[serde(rename = "營收成長穩定性")]
    pub sales_stability: f64,
    #[serde(rename = "短期債務結構")]
    pub short_term_debt_structure: f64,
}

/// AML classifier output as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAmlResult {
    #[serde(rename = "hasRisk")]
    pub has_risk: bool,
    #[serde(rename = "riskLevel")]
    pub risk_level: String,
    pub reason: String,
}

impl LlmScoreResult {
    pub fn from_json(value: serde_json::Value) -> anyhow::Result<Self> {
        serde_json::from_value(value).context("score result does not match the scoring schema")
    }

    pub fn validate_and_into_result(self) -> anyhow::Result<ScoreResult> {
        let total = whole_score(self.total, 100, "總分")?;
        let tier = RiskTier::from_label(&self.risk_level)
            .with_context(|| format!("unknown risk level: {:?}", self.risk_level))?;

        let comment = self.comment.trim().to_string();
        ensure!(!comment.is_empty(), "評語 must be non-empty");

        let s = &self.sub_scores;
        let sub_scores = SubScores {
            debt_service_years: sub_score(s.debt_service_years, SubScore::DebtServiceYears)?,
            ebitda_stability: sub_score(s.ebitda_stability, SubScore::EbitdaStability)?,
            cash_flow_coverage: sub_score(s.cash_flow_coverage, SubScore::CashFlowCoverage)?,
            interest_coverage: sub_score(s.interest_coverage, SubScore::InterestCoverage)?,
            capex_efficiency: sub_score(s.capex_efficiency, SubScore::CapexEfficiency)?,
            current_ratio: sub_score(s.current_ratio, SubScore::CurrentRatio)?,
            sales_stability: sub_score(s.sales_stability, SubScore::SalesStability)?,
            short_term_debt_structure: sub_score(
                s.short_term_debt_structure,
                SubScore::ShortTermDebtStructure,
            )?,
        };

        if sub_scores.sum() != u32::from(total) {
            tracing::warn!(
                total,
                sub_score_sum = sub_scores.sum(),
                "score total differs from the sum of its sub-scores"
            );
        }

        Ok(ScoreResult {
            total,
            tier,
            comment,
            sub_scores,
            band: RiskTier::band_for_total(total),
        })
    }
}

impl LlmAmlResult {
    pub fn from_json(value: serde_json::Value) -> anyhow::Result<Self> {
        serde_json::from_value(value).context("AML result does not match the classification schema")
    }

    pub fn validate_and_into_result(self) -> anyhow::Result<AmlResult> {
        let labelled = AmlTier::from_label(&self.risk_level)
            .with_context(|| format!("unknown AML risk level: {:?}", self.risk_level))?;

        let reason = self.reason.trim().to_string();
        ensure!(!reason.is_empty(), "reason must be non-empty");

        let tier = if self.has_risk {
            AmlTier::Flagged
        } else {
            AmlTier::Clear
        };
        if tier != labelled {
            tracing::warn!(
                has_risk = self.has_risk,
                risk_level = %self.risk_level,
                "AML flag and risk level disagree; flag wins"
            );
        }

        Ok(AmlResult {
            has_risk: self.has_risk,
            tier,
            reason,
        })
    }
}

fn sub_score(value: f64, item: SubScore) -> anyhow::Result<u8> {
    whole_score(value, item.max(), item.label())
}

fn whole_score(value: f64, max: u8, field: &str) -> anyhow::Result<u8> {
    ensure!(
        value.is_finite() && value.fract() == 0.0,
        "{field} must be an integer (got {value})"
    );
    ensure!(
        (0.0..=f64::from(max)).contains(&value),
        "{field} must be between 0 and {max} (got {value})"
    );
    Ok(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_score_json() -> serde_json::Value {
        json!({
            "總分": 85,
            "風險等級": "低風險",
            "評語": "現金流穩定，償債能力佳",
            "細項評分": {
                "償債年限": 18,
                "EBITDA穩定性": 18,
                "現金流償債能力": 17,
                "利息保障倍數": 9,
                "資本支出效率": 7,
                "流動比率": 4,
                "營收成長穩定性": 4,
                "短期債務結構": 8
            }
        })
    }

    #[test]
    fn accepts_valid_score() {
        let result = LlmScoreResult::from_json(valid_score_json())
            .unwrap()
            .validate_and_into_result()
            .unwrap();
        assert_eq!(result.total, 85);
        assert_eq!(result.tier, RiskTier::Low);
        assert_eq!(result.sub_scores.sum(), 85);
        assert_eq!(result.sub_scores.get(SubScore::CurrentRatio), 4);
        assert_eq!(result.band, RiskTier::Low);
    }

    #[test]
    fn accepts_integral_floats() {
        let mut v = valid_score_json();
        v["總分"] = json!(85.0);
        let result = LlmScoreResult::from_json(v)
            .unwrap()
            .validate_and_into_result()
            .unwrap();
        assert_eq!(result.total, 85);
    }

    #[test]
    fn rejects_out_of_range_sub_score() {
        let mut v = valid_score_json();
        v["細項評分"]["流動比率"] = json!(6);
        let err = LlmScoreResult::from_json(v)
            .unwrap()
            .validate_and_into_result()
            .unwrap_err();
        assert!(err.to_string().contains("流動比率"));
    }

    #[test]
    fn rejects_unknown_tier_and_fractional_total() {
        let mut v = valid_score_json();
        v["風險等級"] = json!("極低風險");
        assert!(LlmScoreResult::from_json(v)
            .unwrap()
            .validate_and_into_result()
            .is_err());

        let mut v = valid_score_json();
        v["總分"] = json!(85.5);
        assert!(LlmScoreResult::from_json(v)
            .unwrap()
            .validate_and_into_result()
            .is_err());
    }

    #[test]
    fn rejects_missing_sub_scores() {
        let mut v = valid_score_json();
        v.as_object_mut().unwrap().remove("細項評分");
        assert!(LlmScoreResult::from_json(v).is_err());
    }

    #[test]
    fn rejects_string_total() {
        let mut v = valid_score_json();
        v["總分"] = json!("85");
        assert!(LlmScoreResult::from_json(v).is_err());
    }

    #[test]
    fn accepts_valid_aml() {
        let result = LlmAmlResult::from_json(json!({
            "hasRisk": true,
            "riskLevel": "高風險",
            "reason": "涉及詐欺案件"
        }))
        .unwrap()
        .validate_and_into_result()
        .unwrap();
        assert!(result.has_risk);
        assert_eq!(result.tier, AmlTier::Flagged);
    }

    #[test]
    fn aml_flag_decides_the_tier_when_they_disagree() {
        let result = LlmAmlResult::from_json(json!({
            "hasRisk": true,
            "riskLevel": "安全",
            "reason": "涉及洗錢調查"
        }))
        .unwrap()
        .validate_and_into_result()
        .unwrap();
        assert!(result.has_risk);
        assert_eq!(result.tier, AmlTier::Flagged);

        let result = LlmAmlResult::from_json(json!({
            "hasRisk": false,
            "riskLevel": "高風險",
            "reason": "無相關新聞"
        }))
        .unwrap()
        .validate_and_into_result()
        .unwrap();
        assert_eq!(result.tier, AmlTier::Clear);
    }

    #[test]
    fn rejects_aml_with_unknown_level_or_wrong_types() {
        assert!(LlmAmlResult::from_json(json!({
            "hasRisk": false,
            "riskLevel": "中風險",
            "reason": "x"
        }))
        .unwrap()
        .validate_and_into_result()
        .is_err());

        assert!(LlmAmlResult::from_json(json!({
            "hasRisk": "no",
            "riskLevel": "安全",
            "reason": "x"
        }))
        .is_err());
    }
}
