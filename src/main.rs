use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use medimate_lib::config::AppConfig;
use medimate_lib::models::{DocumentKind, IntakeRequest, PrescriptionRequest};
use medimate_lib::service::{MediMate, ServiceError};

#[derive(Parser)]
#[command(name = "medimate")]
#[command(about = "Bilingual intake and prescription content for clinic visits", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an intake form (JSON file) into a bilingual record
    Intake {
        /// Path to the intake form JSON
        #[arg(long)]
        file: PathBuf,
    },
    /// Explain the medicines on a prescription photo
    Prescription {
        /// Path to the prescription image
        #[arg(long)]
        image: PathBuf,
        /// Patient language (word or ISO code)
        #[arg(long, default_value = "")]
        language: String,
    },
    /// List stored records, newest first
    List {
        /// Only records of this kind (intake | prescription)
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DocumentKind>,
    },
    /// Show one stored record
    Show { id: Uuid },
    /// Regenerate blank fields of a stored intake record
    Refresh { id: Uuid },
    /// Translate a chat message
    Translate {
        /// Target language
        #[arg(long)]
        language: String,
        text: String,
    },
    /// Opening line of a chat room
    Chat {
        /// Seed the room from this record
        #[arg(long)]
        record: Option<Uuid>,
        /// Greeting language when no record is given
        #[arg(long, default_value = "")]
        language: String,
    },
}

fn parse_kind(raw: &str) -> Result<DocumentKind, String> {
    DocumentKind::from_str(raw).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let app = MediMate::from_config(&config)?;

    match cli.command {
        Commands::Intake { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let request: IntakeRequest = serde_json::from_str(&raw)?;
            print_json(&app.submit_intake(&request)?)
        }
        Commands::Prescription { image, language } => {
            let bytes = std::fs::read(&image)?;
            let request = PrescriptionRequest::new(language, bytes);
            print_json(&app.submit_prescription(&request)?)
        }
        Commands::List { kind } => print_json(&app.list(kind)?),
        Commands::Show { id } => print_json(&app.get(&id)?),
        Commands::Refresh { id } => print_json(&app.refresh(&id)?),
        Commands::Translate { language, text } => print_json(&app.translate(&text, &language)),
        Commands::Chat { record, language } => {
            print_json(&app.open_chat(record.as_ref(), &language)?)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    medimate_lib::init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(ServiceError::Pipeline(p)) = e.downcast_ref::<ServiceError>() {
                eprintln!("  stage: {}, kind: {:?}: {}", p.stage, p.kind, p.message);
            }
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
