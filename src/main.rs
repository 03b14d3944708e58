mod answer;
mod assistant;
mod catalog;
mod cli;
mod config;
mod context;
mod documents;
mod error;
mod orchestrator;
mod output;
mod partition;
mod provisioning;
mod state_machine;
mod telemetry;
mod ui;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use assistant::AssistantClient;
use catalog::QuestionCatalog;
use cli::{Cli, Command};
use config::AnalystConfig;
use orchestrator::{BatchSettings, Orchestrator};
use output::BatchReport;
use state_machine::TokioClock;
use ui::BatchProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AnalystConfig::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    cli.apply_overrides(&mut config);

    telemetry::init(&config.log_level, cli.verbose);

    let catalog = QuestionCatalog::load_or_builtin(config.questions_file.as_deref())
        .context("failed to load question catalog")?;

    match cli.command {
        Command::Questions { json } => print_catalog(&catalog, json),
        Command::Provision => {
            config.validate()?;
            let client = build_client(&config)?;
            let id = provisioning::ensure_assistant(
                &client,
                provisioning::ASSISTANT_NAME,
                provisioning::ASSISTANT_INSTRUCTIONS,
                &config.model,
            )
            .await?;
            println!("{id}");
            Ok(())
        }
        Command::Run { documents: paths } => run(&config, &catalog, paths).await,
    }
}

fn build_client(config: &AnalystConfig) -> Result<AssistantClient> {
    Ok(AssistantClient::new(
        &config.endpoint,
        config.api_key.clone(),
        config.api_version.clone(),
        config.accept_invalid_certs,
    )?)
}

async fn run(
    config: &AnalystConfig,
    catalog: &QuestionCatalog,
    paths: Vec<std::path::PathBuf>,
) -> Result<()> {
    config.validate()?;

    let documents = if paths.is_empty() {
        documents::discover(&config.input_dir)?
    } else {
        paths
    };
    if documents.is_empty() {
        return Err(error::AnalystError::NoDocuments(config.input_dir.display().to_string()).into());
    }
    info!(
        documents = documents.len(),
        sections = catalog.sections().len(),
        questions = catalog.total_questions(),
        "starting batch"
    );

    let client = build_client(config)?;
    let assistant_id = provisioning::ensure_assistant(
        &client,
        provisioning::ASSISTANT_NAME,
        provisioning::ASSISTANT_INSTRUCTIONS,
        &config.model,
    )
    .await
    .context("failed to provision assistant")?;

    let settings = BatchSettings {
        policy: config.retry_policy()?,
        max_chars_context: config.max_chars_context,
        pause_between_sections: config.pause_between_sections()?,
        cool_down_between_docs: config.cool_down_between_docs()?,
        export_spreadsheet: config.export_spreadsheet,
    };
    let clock = TokioClock::new();
    let orch = Orchestrator::new(&client, &clock, catalog, assistant_id.clone(), settings);

    let mut report = BatchReport::new(&config.model, &assistant_id);
    let progress = BatchProgress::start(documents.len());
    orch.run_batch(&documents, &config.output_dir, &mut report, |_, doc| {
        progress.document_done(doc)
    })
    .await;

    let report_path = report.finish(&config.output_dir)?;
    progress.finish(&report);
    info!(report = %report_path.display(), "batch report written");
    Ok(())
}

fn print_catalog(catalog: &QuestionCatalog, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }
    for section in catalog.sections() {
        println!("{}", section.name);
        for (i, q) in section.questions.iter().enumerate() {
            println!("  {}. {q}", i + 1);
        }
    }
    println!("\n{} questions in {} sections", catalog.total_questions(), catalog.sections().len());
    Ok(())
}
