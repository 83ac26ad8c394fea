//! Claim Intake - command line session runner
//!
//! # Usage
//!
//! ```bash
//! # Interactive session with a police report
//! claim-intake --document police_report.txt --set date=2025-01-12 --set location="Main Street 5"
//!
//! # Replay answers from a transcript and write artifacts
//! claim-intake --claim-type theft --transcript answers.txt --out out/ --name claim_001
//! ```
//!
//! # Environment Variables
//!
//! * `INTAKE_MAX_TURNS` - Turn budget (default: 20)
//! * `INTAKE_QUESTIONS_PER_TURN` - Missing fields asked per turn, 1 to 3 (default: 1)
//! * `INTAKE_EXTRACTION_TIMEOUT_MS` - Extraction timeout (default: 30000)
//! * `INTAKE_EXTRACTOR` - `rule_based`, `model` or `model_with_fallback`
//! * `INTAKE_MODEL_PROVIDER` - `openrouter` or `openai` (default: openrouter)
//! * `INTAKE_MODEL_NAME`, `INTAKE_API_KEY`, `INTAKE_SITE_URL`, `INTAKE_SITE_NAME`
//! * `INTAKE_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `INTAKE_LOG_JSON` - JSON log lines (default: false)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use domain_intake::{OperatorIo, SessionOutcome};
use interface_intake::{
    init_tracing, write_artifacts, ConsoleOperator, IntakeApp, IntakeConfig, ReplayOperator, SessionRequest,
};

#[derive(Debug, Parser)]
#[command(
    name = "claim-intake",
    about = "Resolve a claim from operator statements and supporting documents",
    after_help = "Examples:\n  claim-intake --document report.txt\n  claim-intake --transcript answers.txt --out out/"
)]
struct Cli {
    #[arg(long, default_value = domain_intake::DEFAULT_CLAIM_TYPE, help = "Claim type")]
    claim_type: String,

    #[arg(long = "document", help = "Document to ingest (repeatable)")]
    documents: Vec<String>,

    #[arg(long = "set", value_parser = parse_declaration, help = "Declared value as field=value (repeatable)")]
    declared: Vec<(String, String)>,

    #[arg(long, help = "Answer from a transcript file instead of the console")]
    transcript: Option<PathBuf>,

    #[arg(long, help = "Directory for the session artifacts")]
    out: Option<PathBuf>,

    #[arg(long, default_value = "claim", help = "Artifact file name prefix")]
    name: String,
}

fn parse_declaration(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim().to_string(), value.trim().to_string()))
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| format!("expected field=value, got `{raw}`"))
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %e, "claim intake failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one session; `Ok(false)` when it ended abandoned
async fn run() -> anyhow::Result<bool> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = IntakeConfig::from_env().context("loading configuration")?;
    init_tracing(&config.log_level, config.log_json);

    let app = IntakeApp::from_config(config)?;
    tracing::info!(?app, "starting claim intake");

    let mut request = SessionRequest::new(cli.claim_type);
    request.documents = cli.documents;
    for (field, value) in cli.declared {
        request = request.declare(field, value);
    }

    let operator: Arc<dyn OperatorIo> = match &cli.transcript {
        Some(path) => Arc::new(
            ReplayOperator::from_file(path)
                .await
                .with_context(|| format!("reading transcript {}", path.display()))?,
        ),
        None => Arc::new(ConsoleOperator::stdio()),
    };

    let session = app.run(&request, operator).await?;

    match &session.outcome {
        SessionOutcome::Resolved(_) => {
            print!("{}", interface_intake::summary_text(&session));
        }
        SessionOutcome::Abandoned(report) => {
            println!(
                "Claim abandoned after {} turn(s). Missing: [{}] Conflicting: [{}]",
                report.turns,
                report.missing.join(", "),
                report.conflicting.join(", ")
            );
        }
    }

    if let Some(dir) = &cli.out {
        let paths = write_artifacts(dir, &cli.name, &session).await?;
        println!("Artifacts written to {}", paths.claim_state.display());
    }

    Ok(session.outcome.is_resolved())
}
