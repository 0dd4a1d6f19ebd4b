use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creditdesk_core::config::Settings;
use creditdesk_core::ingest::{load_dataset, Dataset, DatasetPaths};
use creditdesk_core::review::{PanelState, ReviewSession, Reviewer};

#[derive(Debug, Parser)]
#[command(name = "creditdesk_worker", about = "Run one credit review from the command line")]
struct Args {
    /// Spreadsheet export (xlsx or csv). Overrides CREDITDESK_WORKBOOK.
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// Company directory JSON. Overrides CREDITDESK_COMPANIES.
    #[arg(long)]
    companies: Option<PathBuf>,

    /// Company id to review. Defaults to the first company in the directory.
    #[arg(long)]
    company: Option<String>,

    /// Print companies matching this query and exit.
    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    skip_score: bool,

    #[arg(long)]
    skip_aml: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let paths = DatasetPaths {
        companies: args.companies.clone().unwrap_or_else(|| settings.companies_path()),
        workbook: args.workbook.clone().unwrap_or_else(|| settings.workbook_path()),
    };
    let dataset = load_dataset(&paths).await.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        e
    })?;

    if let Some(query) = args.search.as_deref() {
        let matches = dataset.directory.search(query);
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    let reviewer = Reviewer::from_secrets(&settings, &settings)?;
    let session = review(&dataset, &reviewer, &args).await?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

async fn review(dataset: &Dataset, reviewer: &Reviewer, args: &Args) -> anyhow::Result<ReviewSession> {
    let company_id = match args.company.as_deref() {
        Some(id) => id.to_string(),
        None => dataset
            .directory
            .first()
            .map(|c| c.id.clone())
            .context("company directory is empty")?,
    };

    let (mut session, ticket) = ReviewSession::default()
        .select(dataset, &company_id)
        .with_context(|| format!("select company {company_id} failed"))?;

    let score = async {
        if args.skip_score {
            PanelState::Idle
        } else {
            reviewer.run_score(&ticket).await
        }
    };
    let aml = async {
        if args.skip_aml {
            PanelState::Idle
        } else {
            reviewer.run_aml(&ticket).await
        }
    };
    let (score, aml) = tokio::join!(score, aml);

    session.apply_score(ticket.generation, score);
    session.apply_aml(ticket.generation, aml);

    if let Some(result) = ready(&session.score) {
        tracing::info!(
            company = %company_id,
            total = result.total,
            band = result.band.label(),
            "review finished"
        );
    }
    Ok(session)
}

fn ready<T>(state: &PanelState<T>) -> Option<&T> {
    match state {
        PanelState::Ready { result } => Some(result),
        _ => None,
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditdesk_core::domain::company::{Company, CompanyDirectory};
    use creditdesk_core::domain::record::{CellValue, FinancialRecord, Metric};

    fn dataset() -> Dataset {
        Dataset {
            directory: CompanyDirectory::new(vec![
                Company {
                    id: "2412".to_string(),
                    name: "中華電信".to_string(),
                    name_en: "Chunghwa Telecom".to_string(),
                    industry: Some("電信業".to_string()),
                },
                Company {
                    id: "2330".to_string(),
                    name: "台積電".to_string(),
                    name_en: "TSMC".to_string(),
                    industry: None,
                },
            ]),
            records: vec![FinancialRecord {
                company_id: "2412".to_string(),
                fiscal_year: 2021,
                metrics: [(Metric::ShortTermDebt, CellValue::Number(1000.0))]
                    .into_iter()
                    .collect(),
            }],
        }
    }

    #[test]
    fn parses_flags() {
        let args = Args::parse_from([
            "creditdesk_worker",
            "--workbook",
            "book.csv",
            "--company",
            "2412",
            "--skip-aml",
        ]);
        assert_eq!(args.workbook, Some(PathBuf::from("book.csv")));
        assert_eq!(args.company.as_deref(), Some("2412"));
        assert!(args.skip_aml);
        assert!(!args.skip_score);
    }

    #[tokio::test]
    async fn reviews_first_company_by_default() {
        let args = Args::parse_from(["creditdesk_worker", "--skip-score"]);
        let session = review(&dataset(), &Reviewer::default(), &args).await.unwrap();
        assert_eq!(session.company.map(|c| c.id), Some("2412".to_string()));
        assert_eq!(session.score, PanelState::Idle);
        assert!(matches!(session.aml, PanelState::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn company_without_data_is_an_error() {
        let args = Args::parse_from(["creditdesk_worker", "--company", "2330"]);
        let err = review(&dataset(), &Reviewer::default(), &args)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("no data for company 2330"));
    }
}
