use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Label used by the scoring service.
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "低風險",
            RiskTier::Medium => "中風險",
            RiskTier::High => "高風險",
        }
    }

    pub fn from_label(label: &str) -> Option<RiskTier> {
        match label.trim() {
            "低風險" => Some(RiskTier::Low),
            "中風險" => Some(RiskTier::Medium),
            "高風險" => Some(RiskTier::High),
            _ => None,
        }
    }

    /// Display band derived from a total score, independent of the tier the service reported.
    pub fn band_for_total(total: u8) -> RiskTier {
        match total {
            81.. => RiskTier::Low,
            51.. => RiskTier::Medium,
            _ => RiskTier::High,
        }
    }
}

/// The eight rubric items. Maxima sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubScore {
    DebtServiceYears,
    EbitdaStability,
    CashFlowCoverage,
    InterestCoverage,
    CapexEfficiency,
    CurrentRatio,
    SalesStability,
    ShortTermDebtStructure,
}

impl SubScore {
    pub const ALL: [SubScore; 8] = [
        SubScore::DebtServiceYears,
        SubScore::EbitdaStability,
        SubScore::CashFlowCoverage,
        SubScore::InterestCoverage,
        SubScore::CapexEfficiency,
        SubScore::CurrentRatio,
        SubScore::SalesStability,
        SubScore::ShortTermDebtStructure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SubScore::DebtServiceYears => "償債年限",
            SubScore::EbitdaStability => "EBITDA穩定性",
            SubScore::CashFlowCoverage => "現金流償債能力",
            SubScore::InterestCoverage => "利息保障倍數",
            SubScore::CapexEfficiency => "資本支出效率",
            SubScore::CurrentRatio => "流動比率",
            SubScore::SalesStability => "營收成長穩定性",
            SubScore::ShortTermDebtStructure => "短期債務結構",
        }
    }

    pub fn max(self) -> u8 {
        match self {
            SubScore::DebtServiceYears | SubScore::EbitdaStability | SubScore::CashFlowCoverage => {
                20
            }
            SubScore::InterestCoverage
            | SubScore::CapexEfficiency
            | SubScore::ShortTermDebtStructure => 10,
            SubScore::CurrentRatio | SubScore::SalesStability => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubScores {
    pub debt_service_years: u8,
    pub ebitda_stability: u8,
    pub cash_flow_coverage: u8,
    pub interest_coverage: u8,
    pub capex_efficiency: u8,
    pub current_ratio: u8,
    pub sales_stability: u8,
    pub short_term_debt_structure: u8,
}

impl SubScores {
    pub fn get(&self, item: SubScore) -> u8 {
        match item {
            SubScore::DebtServiceYears => self.debt_service_years,
            SubScore::EbitdaStability => self.ebitda_stability,
            SubScore::CashFlowCoverage => self.cash_flow_coverage,
            SubScore::InterestCoverage => self.interest_coverage,
            SubScore::CapexEfficiency => self.capex_efficiency,
            SubScore::CurrentRatio => self.current_ratio,
            SubScore::SalesStability => self.sales_stability,
            SubScore::ShortTermDebtStructure => self.short_term_debt_structure,
        }
    }

    pub fn sum(&self) -> u32 {
        SubScore::ALL.iter().map(|s| u32::from(self.get(*s))).sum()
    }
}

/// Validated output of the scoring service for one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub total: u8,
    pub tier: RiskTier,
    pub comment: String,
    pub sub_scores: SubScores,
    /// Band the total falls in, which may differ from `tier`.
    pub band: RiskTier,
}
