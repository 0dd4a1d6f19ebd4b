use crate::domain::company::Company;
use crate::domain::record::Metric;
use crate::news::Article;
use crate::pipeline::aggregate::AggregateSnapshot;
use crate::pipeline::charts::to_fixed2;
use anyhow::Context;
use serde::Serialize;

const MAX_ARTICLES: usize = 5;
const UNDEFINED_RATIO: &str = "N/A";

/// Financial summary embedded in the scoring prompt. Field order is the order the model sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    #[serde(rename = "公司名稱")]
    pub company_name: String,
    #[serde(rename = "股票代號")]
    pub company_id: String,
    #[serde(rename = "產業別")]
    pub industry: String,
    #[serde(rename = "分析期間")]
    pub period: String,
    #[serde(rename = "平均財務指標")]
    pub averages: AverageFigures,
    #[serde(rename = "計算指標")]
    pub ratios: RatioFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageFigures {
    #[serde(rename = "短期借款")]
    pub short_term_debt: i64,
    #[serde(rename = "一年內到期長期負債")]
    pub current_portion_long_term_debt: i64,
    #[serde(rename = "長期負債")]
    pub long_term_debt: i64,
    #[serde(rename = "EBITDA")]
    pub ebitda: i64,
    #[serde(rename = "營收淨額")]
    pub sales: i64,
    #[serde(rename = "自由現金流量")]
    pub free_cash_flow: i64,
    #[serde(rename = "利息保障倍數")]
    pub times_interest_earned: String,
    #[serde(rename = "流動比率")]
    pub current_ratio: String,
    #[serde(rename = "資本支出")]
    pub capital_expenditure: i64,
    #[serde(rename = "總資產")]
    pub total_assets: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioFigures {
    #[serde(rename = "償債年限")]
    pub debt_service_years: String,
    #[serde(rename = "現金流償債能力")]
    pub cash_flow_coverage: String,
    #[serde(rename = "短期債務結構")]
    pub short_term_debt_ratio: String,
    #[serde(rename = "資本支出效率")]
    pub capex_efficiency: String,
}

impl ScoreSummary {
    /// `snapshot` should be computed with zero substituted for missing metrics.
    pub fn new(company: &Company, snapshot: &AggregateSnapshot) -> Self {
        let m = &snapshot.means;
        let r = &snapshot.ratios;
        Self {
            company_name: company.name.clone(),
            company_id: company.id.clone(),
            industry: company.industry_or_default().to_string(),
            period: format!("{} - {}", snapshot.first_year, snapshot.last_year),
            averages: AverageFigures {
                short_term_debt: round_half_up(m.get(Metric::ShortTermDebt)),
                current_portion_long_term_debt: round_half_up(
                    m.get(Metric::CurrentPortionLongTermDebt),
                ),
                long_term_debt: round_half_up(m.get(Metric::LongTermDebt)),
                ebitda: round_half_up(m.get(Metric::Ebitda)),
                sales: round_half_up(m.get(Metric::Sales)),
                free_cash_flow: round_half_up(m.get(Metric::FreeCashFlow)),
                times_interest_earned: to_fixed2(m.get(Metric::TimesInterestEarned)),
                current_ratio: to_fixed2(m.get(Metric::CurrentRatio)),
                capital_expenditure: round_half_up(m.get(Metric::CapitalExpenditure)),
                total_assets: round_half_up(m.get(Metric::TotalAssets)),
            },
            ratios: RatioFigures {
                debt_service_years: fixed2(r.debt_service_years),
                cash_flow_coverage: percent2(r.cash_flow_coverage_pct),
                short_term_debt_ratio: percent2(r.short_term_debt_ratio_pct),
                capex_efficiency: percent2(r.capex_efficiency_pct),
            },
        }
    }
}

/// Rounds halves toward positive infinity: `2.5 -> 3`, `-2.5 -> -2`.
fn round_half_up(v: f64) -> i64 {
    if v.is_finite() {
        (v + 0.5).floor() as i64
    } else {
        0
    }
}

fn fixed2(v: Option<f64>) -> String {
    v.map_or_else(|| UNDEFINED_RATIO.to_string(), to_fixed2)
}

fn percent2(v: Option<f64>) -> String {
    v.map_or_else(|| UNDEFINED_RATIO.to_string(), |v| format!("{}%", to_fixed2(v)))
}

const SCORE_SCHEMA: &str = r#"請以JSON格式回傳評估結果（僅回傳JSON，不要其他文字）：
{
  "總分": 0-100的整數,
  "風險等級": "低風險" 或 "中風險" 或 "高風險",
  "評語": "一句話的專業評語（30字以內，說明主要優勢或風險）",
  "細項評分": {
    "償債年限": 0-20的整數,
    "EBITDA穩定性": 0-20的整數,
    "現金流償債能力": 0-20的整數,
    "利息保障倍數": 0-10的整數,
    "資本支出效率": 0-10的整數,
    "流動比率": 0-5的整數,
    "營收成長穩定性": 0-5的整數,
    "短期債務結構": 0-10的整數
  }
}"#;

const SCORE_RUBRIC: &str = "評分標準（請嚴格參考）：
1. 償債年限 (20分)：越低越好
2. EBITDA穩定性 (20分)：波動越小越好
3. 現金流償債能力 (20分)：越高越好
4. 利息保障倍數 (10分)：越高越好
5. 資本支出效率 (10分)：適中為佳
6. 流動比率 (5分)：>1為佳
7. 營收成長穩定性 (5分)：波動越小越好
8. 短期債務結構 (10分)：佔比越低越好

總分 = 所有細項評分之和。

**重要：請根據該公司的產業別特性進行評分**
- 電信業：資本密集、現金流穩定、EBITDA高
- 半導體業：資本支出高、營收波動大、技術密集
- 電子製造業：毛利低、週轉快、營運資金需求高
- 金融保險業：槓桿高、流動性要求嚴格、利息收入為主
- 塑膠化工業：景氣循環明顯、原物料成本敏感

請綜合考慮：
1. 產業特性（根據「產業別」欄位調整評分標準）
2. 償債能力（負債/EBITDA、利息保障倍數、流動比率）
3. 現金流健康度（FCF償債能力、資本支出效率）
4. 整體財務結構與產業平均水準比較";

/// Scoring prompt: instruction, the pretty-printed summary, output schema, then the rubric.
pub fn build_score_prompt(summary: &ScoreSummary) -> anyhow::Result<String> {
    let summary_json =
        serde_json::to_string_pretty(summary).context("serialize score summary failed")?;
    Ok(format!(
        "你是一位專業的授信審核專員，請根據以下財務數據進行評分和分析：\n\n{summary_json}\n\n{SCORE_SCHEMA}\n\n{SCORE_RUBRIC}"
    ))
}

/// Numbered headline list, at most five entries.
pub fn format_news(articles: &[Article]) -> String {
    articles
        .iter()
        .take(MAX_ARTICLES)
        .enumerate()
        .map(|(i, a)| {
            format!(
                "{}. {}\n   {}",
                i + 1,
                a.title,
                a.description.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_aml_prompt(company_name: &str, articles: &[Article]) -> String {
    let news = format_news(articles);
    format!(
        "你是一位專業的反洗錢（AML）分析師。以下是關於「{company_name}」的最新新聞：

{news}

請分析這些新聞是否涉及以下 AML 風險：
- 洗錢（Money Laundering）
- 非法交易（Illegal Transactions）
- 詐欺（Fraud）
- 金融犯罪（Financial Crime）
- 制裁（Sanctions）
- 貪污（Corruption）

請以JSON格式回傳評估結果（僅回傳JSON，不要其他文字）：
{{
  \"hasRisk\": true 或 false,
  \"riskLevel\": \"高風險\" 或 \"安全\",
  \"reason\": \"若有風險，請說明具體原因；若無風險，則填寫：該客戶未涉及 AML 等負面新聞\"
}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{CellValue, FinancialRecord};
    use crate::pipeline::aggregate::MissingPolicy;

    fn company(industry: Option<&str>) -> Company {
        Company {
            id: "2412".to_string(),
            name: "中華電信".to_string(),
            name_en: "Chunghwa Telecom".to_string(),
            industry: industry.map(str::to_string),
        }
    }

    fn record(year: i32, metrics: &[(Metric, f64)]) -> FinancialRecord {
        FinancialRecord {
            company_id: "2412".to_string(),
            fiscal_year: year,
            metrics: metrics
                .iter()
                .map(|(m, v)| (*m, CellValue::Number(*v)))
                .collect(),
        }
    }

    fn snapshot() -> AggregateSnapshot {
        let records = vec![
            record(
                2020,
                &[
                    (Metric::ShortTermDebt, 100.0),
                    (Metric::LongTermDebt, 300.0),
                    (Metric::Ebitda, 200.0),
                    (Metric::FreeCashFlow, 40.0),
                    (Metric::TimesInterestEarned, 12.4),
                    (Metric::TotalAssets, 1000.0),
                ],
            ),
            record(2021, &[(Metric::ShortTermDebt, 100.0)]),
        ];
        AggregateSnapshot::compute(&records, MissingPolicy::Zero)
    }

    #[test]
    fn rounds_halves_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(100.4), 100);
        assert_eq!(round_half_up(f64::NAN), 0);
    }

    #[test]
    fn summary_uses_zero_filled_means() {
        let summary = ScoreSummary::new(&company(Some("電信業")), &snapshot());
        assert_eq!(summary.industry, "電信業");
        assert_eq!(summary.period, "2020 - 2021");
        assert_eq!(summary.averages.short_term_debt, 100);
        assert_eq!(summary.averages.long_term_debt, 150);
        assert_eq!(summary.averages.times_interest_earned, "6.20");
        assert_eq!(summary.averages.current_ratio, "0.00");
        // total debt 250 over EBITDA 100
        assert_eq!(summary.ratios.debt_service_years, "2.50");
        assert_eq!(summary.ratios.capex_efficiency, "0.00%");
    }

    #[test]
    fn exact_halves_round_up_in_two_decimal_figures() {
        let records = vec![
            record(2020, &[(Metric::CurrentRatio, 0.25)]),
            record(2021, &[(Metric::CurrentRatio, 0.0)]),
        ];
        let snapshot = AggregateSnapshot::compute(&records, MissingPolicy::Zero);
        let summary = ScoreSummary::new(&company(None), &snapshot);
        assert_eq!(summary.averages.current_ratio, "0.13");
    }

    #[test]
    fn undefined_ratios_render_as_na() {
        let records = vec![record(2021, &[(Metric::ShortTermDebt, 10.0)])];
        let snapshot = AggregateSnapshot::compute(&records, MissingPolicy::Zero);
        let summary = ScoreSummary::new(&company(None), &snapshot);
        assert_eq!(summary.industry, "一般產業");
        assert_eq!(summary.ratios.debt_service_years, "N/A");
        assert_eq!(summary.ratios.short_term_debt_ratio, "N/A");
        assert_eq!(summary.ratios.cash_flow_coverage, "0.00%");
    }

    #[test]
    fn score_prompt_keeps_field_order_and_rubric() {
        let summary = ScoreSummary::new(&company(None), &snapshot());
        let prompt = build_score_prompt(&summary).unwrap();
        assert!(prompt.starts_with("你是一位專業的授信審核專員"));
        let name = prompt.find("\"公司名稱\": \"中華電信\"").unwrap();
        let period = prompt.find("\"分析期間\": \"2020 - 2021\"").unwrap();
        let ratios = prompt.find("\"計算指標\"").unwrap();
        assert!(name < period && period < ratios);
        assert!(prompt.contains("\"短期債務結構\": 0-10的整數"));
        assert!(prompt.contains("總分 = 所有細項評分之和。"));
    }

    #[test]
    fn score_prompt_is_deterministic() {
        let summary = ScoreSummary::new(&company(None), &snapshot());
        assert_eq!(
            build_score_prompt(&summary).unwrap(),
            build_score_prompt(&summary).unwrap()
        );
    }

    #[test]
    fn news_is_numbered_and_capped_at_five() {
        let articles: Vec<Article> = (1..=7)
            .map(|i| Article {
                title: format!("title {i}"),
                description: (i != 2).then(|| format!("desc {i}")),
            })
            .collect();
        let news = format_news(&articles);
        assert!(news.starts_with("1. title 1\n   desc 1\n\n2. title 2\n   \n\n3."));
        assert!(news.contains("5. title 5"));
        assert!(!news.contains("title 6"));
    }

    #[test]
    fn aml_prompt_names_company_and_schema() {
        let articles = vec![Article {
            title: "標題".to_string(),
            description: None,
        }];
        let prompt = build_aml_prompt("中華電信", &articles);
        assert!(prompt.contains("以下是關於「中華電信」的最新新聞：\n\n1. 標題\n   \n"));
        assert!(prompt.contains("- 貪污（Corruption）"));
        assert!(prompt.contains("\"riskLevel\": \"高風險\" 或 \"安全\""));
    }
}
