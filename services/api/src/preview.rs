use chrono::{DateTime, Utc};
use clap::Args;
use inspection_service::config::AppConfig;
use inspection_service::error::AppError;
use inspection_service::workflows::inspection::acts::render::fill_docx;
use inspection_service::workflows::inspection::peers::{Brigade, Contract};
use inspection_service::workflows::inspection::{
    compose, ActInput, ActRenderer, ComposedAct, DocxTemplateRenderer, FinishInspectionRequest,
    InspectedDevice, InspectionServiceError,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct ActPreviewArgs {
    /// JSON fixture with Request, Brigade, Contract and optional PreviousReadings
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Template to render with; defaults to the configured template for the act kind
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
    /// Write the rendered .docx here
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Composition instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
}

/// Everything an act is composed from, as the service would have fetched it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ActFixture {
    pub(crate) request: FinishInspectionRequest,
    pub(crate) brigade: Brigade,
    pub(crate) contract: Contract,
    #[serde(default)]
    pub(crate) previous_readings: Vec<InspectedDevice>,
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})"))
}

pub(crate) fn run_act_preview(args: ActPreviewArgs) -> Result<(), AppError> {
    let fixture = load_fixture(&args.input)?;
    let act = compose_fixture(&fixture, args.at.unwrap_or_else(Utc::now))?;

    let fields = serde_json::to_string_pretty(&act.fields).map_err(InspectionServiceError::from)?;
    println!("Template: {}", act.template.label());
    println!("Fields ({}):", act.fields.len());
    println!("{fields}");

    if let Some(output) = args.output {
        let document = match args.template {
            Some(template) => fill_docx(&std::fs::read(template)?, &act.fields)
                .map_err(InspectionServiceError::from)?,
            None => {
                let config = AppConfig::load()?;
                DocxTemplateRenderer::from_config(&config.templates)
                    .render(act.template, &act.fields)
                    .map_err(InspectionServiceError::from)?
            }
        };
        std::fs::write(&output, document)?;
        println!("Act written to {}", output.display());
    }

    Ok(())
}

pub(crate) fn load_fixture(path: &Path) -> Result<ActFixture, AppError> {
    let raw = std::fs::read(path)?;
    let fixture = serde_json::from_slice(&raw).map_err(InspectionServiceError::from)?;
    Ok(fixture)
}

pub(crate) fn compose_fixture(
    fixture: &ActFixture,
    now: DateTime<Utc>,
) -> Result<ComposedAct, AppError> {
    let act = compose(ActInput {
        request: &fixture.request,
        brigade: &fixture.brigade,
        contract: &fixture.contract,
        previous_readings: &fixture.previous_readings,
        now,
    })
    .map_err(InspectionServiceError::from)?;
    Ok(act)
}
