use crate::domain::record::{CellValue, FinancialRecord, Metric};
use serde::Serialize;
use std::collections::BTreeMap;

/// How a metric that is absent from a record enters a mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Absent values are left out of both the sum and the count (chart averages).
    Exclude,
    /// Absent values count as zero (scoring summary).
    Zero,
}

/// Arithmetic mean over the values coercible to a finite number.
///
/// Non-numeric and non-finite values never count. Empty or all-excluded input yields `0`.
pub fn mean<'a, I>(values: I, policy: MissingPolicy) -> f64
where
    I: IntoIterator<Item = Option<&'a CellValue>>,
{
    let mut sum = 0.0;
    let mut count: usize = 0;
    for value in values {
        let v = match (value, policy) {
            (Some(cell), _) => cell.as_finite(),
            (None, MissingPolicy::Zero) => Some(0.0),
            (None, MissingPolicy::Exclude) => None,
        };
        if let Some(v) = v {
            sum += v;
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn metric_mean(records: &[FinancialRecord], metric: Metric, policy: MissingPolicy) -> f64 {
    mean(records.iter().map(|r| r.metric(metric)), policy)
}

/// Per-metric means over one record subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricMeans(BTreeMap<Metric, f64>);

impl MetricMeans {
    pub fn compute(records: &[FinancialRecord], policy: MissingPolicy) -> Self {
        Self(
            Metric::ALL
                .into_iter()
                .map(|m| (m, metric_mean(records, m, policy)))
                .collect(),
        )
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }

    /// Short-term debt + current portion of long-term debt + long-term debt.
    pub fn total_debt(&self) -> f64 {
        self.get(Metric::ShortTermDebt)
            + self.get(Metric::CurrentPortionLongTermDebt)
            + self.get(Metric::LongTermDebt)
    }
}

/// Ratios derived from the means. `None` when the denominator is zero or the quotient is not
/// finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedRatios {
    pub debt_service_years: Option<f64>,
    pub cash_flow_coverage_pct: Option<f64>,
    pub short_term_debt_ratio_pct: Option<f64>,
    pub capex_efficiency_pct: Option<f64>,
}

impl DerivedRatios {
    pub fn from_means(means: &MetricMeans) -> Self {
        let total_debt = means.total_debt();
        Self {
            debt_service_years: ratio(total_debt, means.get(Metric::Ebitda)),
            cash_flow_coverage_pct: percent(means.get(Metric::FreeCashFlow), total_debt),
            short_term_debt_ratio_pct: percent(
                means.get(Metric::ShortTermDebt),
                means.get(Metric::TotalAssets),
            ),
            capex_efficiency_pct: percent(
                means.get(Metric::CapitalExpenditure),
                means.get(Metric::FreeCashFlow),
            ),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator).filter(|v| v.is_finite())
}

fn percent(numerator: f64, denominator: f64) -> Option<f64> {
    ratio(numerator, denominator).map(|v| v * 100.0)
}

/// Means and derived ratios for one company's records. Recomputed per selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub first_year: i32,
    pub last_year: i32,
    pub means: MetricMeans,
    pub ratios: DerivedRatios,
}

impl AggregateSnapshot {
    /// `records` must be sorted by year; the period is read from its ends.
    pub fn compute(records: &[FinancialRecord], policy: MissingPolicy) -> Self {
        let means = MetricMeans::compute(records, policy);
        let ratios = DerivedRatios::from_means(&means);
        Self {
            first_year: records.first().map_or(0, |r| r.fiscal_year),
            last_year: records.last().map_or(0, |r| r.fiscal_year),
            means,
            ratios,
        }
    }
}
