//! Meshport - headless mesh export from the terminal
//!
//! Signs in through the system browser, walks project → model → version and
//! waits for the export, printing the download link.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use meshport_domain::{Config, WorkflowState};
use meshport_infra::{config, init_tracing};
use meshport_lib::{commands, AppContext, WorkflowView};
use tracing::{debug, info, warn};

/// Meshport - export iModels as web-ready meshes.
#[derive(Parser)]
#[command(name = "meshport")]
#[command(about = "Sign in, pick a model version and export it as a mesh")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML or JSON). Defaults to environment, then probed files.
    #[arg(long, global = true, env = "MESHPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `meshport_infra=debug`. `RUST_LOG` wins.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON logs on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in through the browser
    Login,

    /// Forget the stored session
    Logout,

    /// Show whether a session is stored and when it expires
    Status,

    /// List projects
    Projects,

    /// List the models of a project
    Models {
        #[arg(long)]
        project: String,
    },

    /// List the versions of a model, newest first
    Versions {
        #[arg(long)]
        project: String,
        #[arg(long)]
        model: String,
    },

    /// Export a model version and print the download link
    Export {
        #[arg(long)]
        project: String,
        #[arg(long)]
        model: String,
        /// Changeset id; latest when omitted
        #[arg(long)]
        version: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.clone())?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    config.logging.json |= cli.json_logs;
    init_tracing(&config.logging)?;

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env loaded"),
    }

    let ctx = Arc::new(AppContext::new_with_config(config)?);
    spawn_interrupt_handler(Arc::clone(&ctx));

    let result = run(&ctx, cli.command, cli.json).await;
    if result.is_err() {
        if let Some(message) = ctx.session.state().error_message() {
            warn!(error = %message, "Workflow stopped in error state");
        }
    }
    result
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let config = config::load_from_file(Some(path.clone()))
                .with_context(|| format!("loading {}", path.display()))?;
            config.validate()?;
            config
        }
        None => config::load().context("no usable configuration")?,
    };
    Ok(config)
}

fn spawn_interrupt_handler(ctx: Arc<AppContext>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling");
            ctx.shutdown();
        }
    });
}

async fn run(ctx: &AppContext, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Login | Commands::Projects => {
            sign_in(ctx).await?;
            print_view(&commands::workflow_state(ctx), json)?;
        }
        Commands::Logout => {
            commands::logout(ctx).await?;
            println!("Signed out");
        }
        Commands::Status => {
            ctx.restore_session().await?;
            let status = commands::auth_status(ctx).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if let (true, Some(expires_at)) = (status.signed_in, status.expires_at) {
                println!("Signed in until {expires_at}");
            } else {
                println!("Not signed in");
            }
        }
        Commands::Models { project } => {
            sign_in(ctx).await?;
            let view = commands::select_project(ctx, &project).await?;
            print_view(&view, json)?;
        }
        Commands::Versions { project, model } => {
            sign_in(ctx).await?;
            commands::select_project(ctx, &project).await?;
            let view = commands::select_model(ctx, &model).await?;
            print_view(&view, json)?;
        }
        Commands::Export { project, model, version } => {
            sign_in(ctx).await?;
            commands::select_project(ctx, &project).await?;
            commands::select_model(ctx, &model).await?;
            commands::select_version(ctx, version.as_deref()).await?;

            let progress = watch_progress(ctx);
            let view = commands::start_export(ctx).await;
            progress.abort();

            let view = view?;
            let Some(href) = view.download_href.as_deref() else {
                bail!("export finished without a download link");
            };
            if json {
                print_view(&view, true)?;
            } else {
                println!("{href}");
            }
        }
    }
    Ok(())
}

/// Restore the stored session, then go through the browser only if needed.
async fn sign_in(ctx: &AppContext) -> anyhow::Result<()> {
    if !ctx.restore_session().await? {
        eprintln!("Opening the browser to sign in...");
    }
    commands::login(ctx).await?;
    Ok(())
}

fn watch_progress(ctx: &AppContext) -> tokio::task::JoinHandle<()> {
    let mut states = ctx.session.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let line = match &*states.borrow_and_update() {
                WorkflowState::StartingExport { .. } => "Starting export...".to_string(),
                WorkflowState::PollingExport { job, .. } => format!("Export {}: {}", job.id, job.status),
                _ => continue,
            };
            eprintln!("{line}");
        }
    })
}

fn print_view(view: &WorkflowView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    match &view.state {
        WorkflowState::SelectProject { projects } => {
            for project in projects {
                let number = project.number.as_deref().unwrap_or("-");
                println!("{}\t{}\t{}", project.id, number, project.display_name);
            }
        }
        WorkflowState::SelectModel { selection: Some(selection), .. } => {
            for changeset in &selection.changesets {
                let pushed = changeset.pushed_at.map(|at| at.to_rfc3339()).unwrap_or_default();
                println!("{}\t#{}\t{}", changeset.id, changeset.index, pushed);
            }
        }
        WorkflowState::SelectModel { models, .. } => {
            for model in models {
                println!("{}\t{}", model.id, model.display_name);
            }
        }
        other => println!("{}", other.name()),
    }
    Ok(())
}
