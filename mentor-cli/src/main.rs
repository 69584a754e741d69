//! Mentor de Redação terminal client
//!
//! Signs in, manages essays and waits for their feedback from a shell.
//! Notices from the client core are printed to stderr; results to stdout.

mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mentor_client::{
    AppContext, ClientConfig, FeedbackPoller, FeedbackView, Notification, NotificationSink,
    Notifier, PollPhase,
};
use mentor_types::{EssayDraft, EssayQuery, EssaySortField, EssayStatus, LoginRequest, SortDirection};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_SESSION_FILE: &str = ".mentor-session.json";

#[derive(Parser, Debug)]
#[command(name = "mentor")]
#[command(about = "Essay writing mentor: submit essays and read their feedback")]
#[command(version)]
struct Args {
    /// Base URL of the REST API
    #[arg(long, env = "MENTOR_API_BASE_URL")]
    api_url: Option<String>,

    /// Where the signed-in session is kept
    #[arg(long, env = "MENTOR_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MENTOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the local session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List essays, one page at a time
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        #[arg(long)]
        status: Option<EssayStatus>,
        #[arg(long)]
        keyword: Option<String>,
        /// Oldest first instead of newest first
        #[arg(long)]
        oldest: bool,
    },
    /// List drafts
    Drafts,
    /// Create an essay from a text file
    New {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "Untitled theme")]
        theme: String,
        /// File with the essay body
        #[arg(long)]
        file: PathBuf,
        /// Send for analysis right away and wait for the feedback
        #[arg(long)]
        submit: bool,
    },
    /// Send an essay for analysis
    Submit {
        id: i64,
        /// Return as soon as the essay is submitted
        #[arg(long)]
        no_wait: bool,
    },
    /// Show the feedback of an essay, waiting for it if needed
    Feedback { id: i64 },
    /// Request a new analysis of an essay
    Resubmit { id: i64 },
    /// Recent essays and score statistics
    Stats,
}

/// Prints notifications to stderr.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn show(&self, notification: Notification) {
        eprintln!("[{}] {}", notification.title, notification.message);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentor_cli=info,mentor_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Before parsing so `.env` values can back the env-aware flags.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.api_url {
        config = config.with_base_url(url);
    }
    config.session_file = Some(
        args.session_file
            .or(config.session_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
    );
    debug!(api_base_url = %config.api_base_url, "configuration loaded");

    let notifier = Notifier::new();
    notifier.register(Arc::new(ConsoleSink));
    let app = AppContext::new(config, notifier).context("failed to initialize API client")?;

    // Failures have already been shown by the notifier; only the exit code is left.
    Ok(match run(&app, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    })
}

async fn run(app: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = app.auth().login(&LoginRequest { email, password }).await?;
            println!("Welcome, {}!", user.first_name());
        }
        Command::Logout => app.auth().logout().await,
        Command::Whoami => {
            if !app.auth_store().is_authenticated() {
                println!("Not signed in.");
                return Ok(());
            }
            let user = app.auth().current_user().await?;
            render::user(&user);
        }
        Command::List {
            page,
            size,
            status,
            keyword,
            oldest,
        } => {
            let direction = if oldest {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            let mut query = EssayQuery::page(page, size).sorted(EssaySortField::UpdatedAt, direction);
            if let Some(status) = status {
                query = query.with_status(status);
            }
            if let Some(keyword) = keyword {
                query = query.with_keyword(keyword);
            }
            let page = app.essays().load_page(&query).await?;
            render::page(&page);
        }
        Command::Drafts => {
            let drafts = app.essays().load_by_status(EssayStatus::Draft).await?;
            render::essays(&drafts);
        }
        Command::New {
            title,
            theme,
            file,
            submit,
        } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let draft = EssayDraft::new(title, theme, content);
            println!(
                "{} words ({})",
                draft.word_count(),
                render::band(draft.word_count())
            );
            if !submit {
                let essay = app.essays().create_draft(&draft).await?;
                println!("Draft #{} saved.", essay.id);
                return Ok(());
            }
            match app.essays().create_and_submit(&draft).await? {
                Some(essay) => wait_for_feedback(app, |poller| poller.watch_submission(essay)).await?,
                None => println!("A submission is already in progress."),
            }
        }
        Command::Submit { id, no_wait } => match app.essays().submit(id).await? {
            Some(essay) if no_wait => println!("Essay #{} is {}.", essay.id, essay.status),
            Some(essay) => wait_for_feedback(app, |poller| poller.watch_submission(essay)).await?,
            None => println!("Essay #{id} is already being submitted."),
        },
        Command::Feedback { id } => wait_for_feedback(app, |poller| poller.start(id)).await?,
        Command::Resubmit { id } => {
            let poller = app.feedback_poller();
            let mut rx = poller.subscribe();
            poller.start(id);
            let view = settle(&mut rx, |v| v.phase != PollPhase::Checking).await?;
            if matches!(view.phase, PollPhase::Failed(_)) {
                anyhow::bail!("essay #{id} could not be loaded");
            }
            if !poller.resubmit().await? {
                println!("Essay #{id} cannot be resubmitted right now.");
                return Ok(());
            }
            follow(&poller).await?;
        }
        Command::Stats => {
            let summary = app.essays().dashboard().await?;
            render::dashboard(&summary);
        }
    }
    Ok(())
}

async fn wait_for_feedback(app: &AppContext, begin: impl FnOnce(&FeedbackPoller)) -> Result<()> {
    let poller = app.feedback_poller();
    begin(&poller);
    follow(&poller).await
}

/// Print progress until the poller settles, or until Ctrl-C.
async fn follow(poller: &FeedbackPoller) -> Result<()> {
    let mut rx = poller.subscribe();
    let mut last_attempt = None;
    let outcome = tokio::select! {
        view = settle(&mut rx, |view| {
            if view.phase == PollPhase::AwaitingAnalysis && last_attempt != Some(view.attempts) {
                last_attempt = Some(view.attempts);
                eprintln!(
                    "Waiting for analysis... {:>3.0}% ({}/{})",
                    view.progress() * 100.0,
                    view.attempts,
                    view.max_attempts
                );
            }
            view.phase.is_terminal()
        }) => view?,
        _ = signal::ctrl_c() => {
            poller.cancel();
            info!("stopped waiting for feedback");
            return Ok(());
        }
    };

    match &outcome.phase {
        PollPhase::Ready => {
            if let (Some(essay), Some(feedback)) = (&outcome.essay, &outcome.feedback) {
                render::feedback(essay, feedback);
            }
            Ok(())
        }
        PollPhase::NotSubmitted => {
            println!("This essay has not been submitted for analysis yet.");
            Ok(())
        }
        PollPhase::TimedOut => {
            println!("Run `mentor feedback <id>` again in a few moments.");
            Ok(())
        }
        PollPhase::Failed(reason) => anyhow::bail!("feedback unavailable: {reason}"),
        PollPhase::Idle | PollPhase::Checking | PollPhase::AwaitingAnalysis => Ok(()),
    }
}

async fn settle(
    rx: &mut tokio::sync::watch::Receiver<FeedbackView>,
    mut done: impl FnMut(&FeedbackView) -> bool,
) -> Result<FeedbackView> {
    loop {
        {
            let view = rx.borrow_and_update();
            if done(&view) {
                return Ok((*view).clone());
            }
        }
        rx.changed().await.context("poller stopped")?;
    }
}
