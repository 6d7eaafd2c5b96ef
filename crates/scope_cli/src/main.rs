//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive a `PatientStore` end to end over the in-memory backend.
//! - Keep output deterministic apart from server-assigned identifiers.
//!
//! Usage: `scope [config.json]`

use chrono::NaiveDate;
use log::error;
use scope_core::{
    core_version, init_logging, init_stderr_logging, Activity, Assessment, InMemoryPatientClient,
    PatientAggregate, PatientProfile, PatientStore, ScopeConfig, Session,
};
use std::process::ExitCode;

const DEMO_PATIENT_ID: &str = "demo-patient";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => match ScopeConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("scope: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => ScopeConfig::default(),
    };

    let logging = match config.log_dir.as_deref() {
        Some(dir) => init_logging(&config.log_level, dir),
        None => init_stderr_logging(&config.log_level),
    };
    if let Err(err) = logging {
        eprintln!("scope: logging disabled: {err}");
    }

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error");
            eprintln!("scope: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &ScopeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let patient_id = config
        .patient_id
        .clone()
        .unwrap_or_else(|| DEMO_PATIENT_ID.to_string());
    let backend = InMemoryPatientClient::new().with_patient(patient_id.as_str(), demo_patient());
    let store =
        PatientStore::new(patient_id, backend).with_request_timeout(config.request_timeout());

    println!("scope_core version={}", core_version());
    store.load().await?;
    let today = chrono::Local::now().date_naive();
    println!(
        "patient name={} age={}",
        store.name(),
        store
            .age(today)
            .map_or_else(|| "unknown".to_string(), |age| age.to_string())
    );

    let first = store.sessions().first().and_then(|session| session.id());
    if let Some(session_id) = first {
        store
            .update_session(Session {
                billable_minutes: Some(45),
                ..Session::with_id(session_id)
            })
            .await?;
    }
    let added = store.add_activity(Activity::named("Morning walk")).await?;

    println!(
        "sessions={} assessments={} activities={} values={}",
        store.sessions().len(),
        store.assessments().len(),
        store.activities().len(),
        store.values().len()
    );
    println!("added activity id={}", added.id().unwrap_or_default());
    Ok(())
}

fn demo_patient() -> PatientAggregate {
    PatientAggregate {
        profile: PatientProfile {
            first_name: Some("Jordan".to_string()),
            last_name: Some("Rivera".to_string()),
            birthdate: NaiveDate::from_ymd_opt(1988, 2, 29),
            ..PatientProfile::default()
        },
        sessions: Some(vec![Session {
            date: NaiveDate::from_ymd_opt(2024, 1, 8),
            session_type: Some("Intake".to_string()),
            ..Session::default()
        }]),
        assessments: Some(vec![Assessment::of_type("phq-9")]),
        activities: Some(Vec::new()),
        activity_schedules: Some(Vec::new()),
        values: Some(Vec::new()),
    }
}
