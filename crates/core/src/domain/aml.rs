use serde::{Deserialize, Serialize};

pub const NO_ADVERSE_NEWS_REASON: &str = "該客戶未涉及 AML 等負面新聞";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmlTier {
    Flagged,
    Clear,
}

impl AmlTier {
    pub fn label(self) -> &'static str {
        match self {
            AmlTier::Flagged => "高風險",
            AmlTier::Clear => "安全",
        }
    }

    pub fn from_label(label: &str) -> Option<AmlTier> {
        match label.trim() {
            "高風險" => Some(AmlTier::Flagged),
            "安全" => Some(AmlTier::Clear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmlResult {
    pub has_risk: bool,
    pub tier: AmlTier,
    pub reason: String,
}

impl AmlResult {
    /// Outcome when the news search finds nothing to classify.
    pub fn clear_without_news() -> Self {
        Self {
            has_risk: false,
            tier: AmlTier::Clear,
            reason: NO_ADVERSE_NEWS_REASON.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_news_is_clear() {
        let r = AmlResult::clear_without_news();
        assert!(!r.has_risk);
        assert_eq!(r.tier, AmlTier::Clear);
        assert_eq!(r.reason, NO_ADVERSE_NEWS_REASON);
    }

    #[test]
    fn tier_labels() {
        assert_eq!(AmlTier::from_label("高風險"), Some(AmlTier::Flagged));
        assert_eq!(AmlTier::from_label(" 安全 "), Some(AmlTier::Clear));
        assert_eq!(AmlTier::from_label("low"), None);
    }
}
