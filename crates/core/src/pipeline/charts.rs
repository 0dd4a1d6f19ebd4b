use crate::domain::record::{CellValue, FinancialRecord, Metric};
use crate::pipeline::aggregate::{metric_mean, MissingPolicy};
use serde::Serialize;

const NEGATIVE_COLOR: &str = "#ef4444";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AverageFormat {
    /// Thousands of NTD, no decimals.
    Amount,
    Ratio,
}

struct ChartDef {
    key: &'static str,
    title: &'static str,
    metric: Metric,
    kind: ChartKind,
    color: &'static str,
    allow_negative: bool,
    average_format: AverageFormat,
}

const CHARTS: [ChartDef; 8] = [
    ChartDef {
        key: "std",
        title: "短期借款",
        metric: Metric::ShortTermDebt,
        kind: ChartKind::Bar,
        color: "#3b82f6",
        allow_negative: false,
        average_format: AverageFormat::Amount,
    },
    ChartDef {
        key: "cpltd",
        title: "一年內到期長期負債",
        metric: Metric::CurrentPortionLongTermDebt,
        kind: ChartKind::Bar,
        color: "#f59e0b",
        allow_negative: false,
        average_format: AverageFormat::Amount,
    },
    ChartDef {
        key: "ltd",
        title: "長期負債",
        metric: Metric::LongTermDebt,
        kind: ChartKind::Bar,
        color: "#8b5cf6",
        allow_negative: false,
        average_format: AverageFormat::Amount,
    },
    ChartDef {
        key: "ebitda",
        title: "EBITDA",
        metric: Metric::Ebitda,
        kind: ChartKind::Line,
        color: "#10b981",
        allow_negative: false,
        average_format: AverageFormat::Amount,
    },
    ChartDef {
        key: "sales",
        title: "營收淨額",
        metric: Metric::Sales,
        kind: ChartKind::Line,
        color: "#6366f1",
        allow_negative: false,
        average_format: AverageFormat::Amount,
    },
    ChartDef {
        key: "fcf",
        title: "自由現金流量",
        metric: Metric::FreeCashFlow,
        kind: ChartKind::Bar,
        color: "#14b8a6",
        allow_negative: true,
        average_format: AverageFormat::Amount,
    },
    ChartDef {
        key: "tie",
        title: "利息保障倍數",
        metric: Metric::TimesInterestEarned,
        kind: ChartKind::Line,
        color: "#ec4899",
        allow_negative: false,
        average_format: AverageFormat::Ratio,
    },
    ChartDef {
        key: "cr",
        title: "流動比率",
        metric: Metric::CurrentRatio,
        kind: ChartKind::Line,
        color: "#f97316",
        allow_negative: false,
        average_format: AverageFormat::Ratio,
    },
];

/// Everything a charting library needs to draw one metric's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub metric: Metric,
    pub kind: ChartKind,
    pub labels: Vec<i32>,
    /// `None` marks a year with no numeric value; drawn as a gap.
    pub values: Vec<Option<f64>>,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_colors: Option<Vec<String>>,
    pub begin_at_zero: bool,
    pub average: f64,
    pub average_label: String,
}

/// The eight dashboard charts for one company's year-sorted records.
pub fn build_charts(records: &[FinancialRecord]) -> Vec<ChartSpec> {
    let labels: Vec<i32> = records.iter().map(|r| r.fiscal_year).collect();
    CHARTS
        .iter()
        .map(|def| build_chart(def, records, labels.clone()))
        .collect()
}

fn build_chart(def: &ChartDef, records: &[FinancialRecord], labels: Vec<i32>) -> ChartSpec {
    let values: Vec<Option<f64>> = records
        .iter()
        .map(|r| r.metric(def.metric).and_then(CellValue::as_finite))
        .collect();

    let point_colors = def.allow_negative.then(|| {
        values
            .iter()
            .map(|v| match v {
                Some(v) if *v < 0.0 => format!("{NEGATIVE_COLOR}99"),
                _ => format!("{}99", def.color),
            })
            .collect()
    });

    let average = metric_mean(records, def.metric, MissingPolicy::Exclude);
    let average_label = match def.average_format {
        AverageFormat::Amount => format!("平均值: {} 仟元", format_thousands(average)),
        AverageFormat::Ratio => format!("平均值: {}", to_fixed2(average)),
    };

    ChartSpec {
        key: def.key,
        title: def.title,
        metric: def.metric,
        kind: def.kind,
        labels,
        values,
        color: def.color,
        point_colors,
        begin_at_zero: def.kind == ChartKind::Bar && !def.allow_negative,
        average,
        average_label,
    }
}

/// Rounds to a whole number and groups digits by thousands: `1234567.6` -> `"1,234,568"`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = value.round();
    if rounded == 0.0 {
        return "0".to_string();
    }

    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Two decimals with exact binary ties rounded away from zero: `0.125` -> `"0.13"`.
///
/// A value sits exactly halfway between two cents only when it is an odd number of
/// eighths, so that case is rounded in integer cents and the rest is left to `{:.2}`.
pub fn to_fixed2(value: f64) -> String {
    if value == 0.0 {
        return "0.00".to_string();
    }
    let eighths = value.abs() * 8.0;
    if eighths.fract() == 0.0 && eighths % 2.0 == 1.0 && eighths < 1e18 {
        let cents = (25 * eighths as u128 + 1) / 2;
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{}.{:02}", cents / 100, cents % 100);
    }
    format!("{value:.2}")
}
