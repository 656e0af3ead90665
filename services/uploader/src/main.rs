use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gallery_core::{generate_event_code, CreateEventRequest, SignupRequest, UploadPolicy};
use gallery_uploader::{
    read_selection, ClientError, FileId, GalleryClient, OrchestratorConfig, ProgressSink,
    UploadOrchestrator, UploadTracker,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gallery-upload")]
#[command(about = "Event photo gallery client", long_about = None)]
struct Cli {
    /// Gallery API base URL
    #[arg(long, env = "GALLERY_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a user
    Signup {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },

    /// Create an event; a code is generated when none is given
    CreateEvent {
        #[arg(long)]
        owner_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },

    /// List an owner's events
    Events {
        #[arg(long)]
        owner_id: String,
    },

    /// Show one event
    Show { code: String },

    /// List an event's photos
    Photos { code: String },

    /// Upload photos to an event as a guest
    Upload {
        code: String,
        #[arg(long)]
        guest_name: Option<String>,
        /// Requests in flight at once
        #[arg(long, default_value_t = 3)]
        group_size: usize,
        /// Pause between groups in milliseconds
        #[arg(long, default_value_t = 200)]
        group_delay_ms: u64,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Logs each file as it settles
struct LogSink;

impl ProgressSink for LogSink {
    fn on_update(&self, tracker: &UploadTracker, changed: FileId) {
        let Some(file) = tracker.get(changed) else {
            return;
        };
        match file.error.as_deref() {
            Some(error) => warn!(
                file = %file.filename,
                status = %file.status,
                settled = tracker.settled(),
                total = tracker.total(),
                error = error,
                "Upload progress"
            ),
            None => info!(
                file = %file.filename,
                status = %file.status,
                progress = file.progress,
                settled = tracker.settled(),
                total = tracker.total(),
                "Upload progress"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = GalleryClient::new(&cli.server, Duration::from_secs(cli.timeout_secs))
        .context("Failed to build gallery client")?;

    match cli.command {
        Command::Signup {
            user_id,
            email,
            name,
        } => {
            let user = client
                .sign_up(&SignupRequest {
                    user_id: Some(user_id),
                    email: Some(email),
                    name,
                })
                .await?;
            print_json(&user)?;
        }
        Command::CreateEvent {
            owner_id,
            title,
            code,
            description,
            date,
            location,
        } => {
            let code = code.unwrap_or_else(|| generate_event_code(&mut rand::thread_rng()));
            let event = client
                .create_event(&CreateEventRequest {
                    title: Some(title),
                    description,
                    date,
                    location,
                    code: Some(code),
                    owner_id: Some(owner_id),
                })
                .await?;
            info!(code = %event.code, "Event created");
            print_json(&event)?;
        }
        Command::Events { owner_id } => {
            print_json(&client.list_events(&owner_id).await?)?;
        }
        Command::Show { code } => {
            print_json(&client.get_event(&code).await?)?;
        }
        Command::Photos { code } => {
            print_json(&client.list_photos(&code).await?)?;
        }
        Command::Upload {
            code,
            guest_name,
            group_size,
            group_delay_ms,
            files,
        } => {
            let policy = UploadPolicy::default();
            let selected = read_selection(&files, &policy).await?;

            let orchestrator = UploadOrchestrator::new(
                Arc::new(client),
                policy,
                OrchestratorConfig {
                    group_size,
                    group_delay: Duration::from_millis(group_delay_ms),
                },
            );

            match orchestrator
                .upload(&code, guest_name.as_deref(), selected, &LogSink)
                .await
            {
                Ok(report) => {
                    info!(
                        uploaded = report.uploaded.len(),
                        failed = report.failures.len(),
                        rejected = report.rejected.len(),
                        "Upload finished"
                    );
                    print_json(&report.uploaded)?;
                }
                Err(ClientError::NothingUploaded { failures }) => {
                    for failure in &failures {
                        warn!(file = %failure.filename, reason = %failure.reason, "Not uploaded");
                    }
                    anyhow::bail!("Failed to upload any files");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}
