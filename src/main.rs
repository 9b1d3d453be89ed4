//! dashguard command line.
//!
//! Drives the guard, loader, and upload pipeline against a configured
//! backend, for smoke-testing a deployment from a terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use dashguard::backend::{Credential, Query, SignInOutcome};
use dashguard::config::{load_config, validate_config, ConfigError, GuardConfig};
use dashguard::lifecycle::signals::teardown_on_interrupt;
use dashguard::notice::{Notice, NoticeLevel, Notifier};
use dashguard::observability::logging::init_tracing;
use dashguard::security::sanitize;
use dashguard::session::{AccessOutcome, ActivityEvent};
use dashguard::upload::UploadFile;
use dashguard::AppContext;

#[derive(Parser)]
#[command(name = "dashguard")]
#[command(about = "Session, security, and upload layer for the operations dashboard", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gate a page and print the decision
    Access {
        /// Page being opened
        #[arg(long, default_value = "dashboard.html")]
        location: String,
        /// Require the admin role
        #[arg(long)]
        admin: bool,
    },
    /// Sign in with a password, or request a magic link without one
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// End the current session
    SignOut,
    /// Upload a file through the fallback chain
    Upload {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Profile::General)]
        profile: Profile,
        /// MIME type; guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Read a table with bounded retry
    Load {
        resource: String,
        #[arg(long)]
        attempts: Option<u32>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the persisted anti-forgery token
    Token,
    /// Run a sanitizer or validator over an input
    Sanitize {
        #[arg(value_enum)]
        kind: SanitizeKind,
        input: String,
    },
    /// Watch for inactivity; each line on stdin counts as activity
    Watch,
    /// Validate the configuration and exit
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Avatar,
    General,
    Proof,
}

#[derive(Clone, Copy, ValueEnum)]
enum SanitizeKind {
    Html,
    Url,
    Text,
    Email,
    Number,
    Date,
}

/// Prints notices to stderr.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{}] {}", tag, notice.message);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::CheckConfig = cli.command {
        let result = match &cli.config {
            Some(path) => load_config(path).map(|_| ()),
            None => validate_config(&GuardConfig::default()).map_err(ConfigError::Validation),
        };
        return Ok(match result {
            Ok(()) => {
                println!("configuration ok");
                ExitCode::SUCCESS
            }
            Err(ConfigError::Validation(errors)) => {
                for error in errors {
                    println!("{}", error);
                }
                ExitCode::FAILURE
            }
            Err(e) => {
                println!("{}", e);
                ExitCode::FAILURE
            }
        });
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    init_tracing(&config.observability);

    if let Commands::Sanitize { kind, input } = &cli.command {
        let output = match kind {
            SanitizeKind::Html => sanitize::sanitize_html(input),
            SanitizeKind::Url => sanitize::sanitize_url(input),
            SanitizeKind::Text => sanitize::validate_text_input(input),
            SanitizeKind::Email => sanitize::validate_email(input).to_string(),
            SanitizeKind::Number => sanitize::validate_number(input).to_string(),
            SanitizeKind::Date => sanitize::validate_date(input).to_string(),
        };
        println!("{}", output);
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = AppContext::connect(config, Arc::new(ConsoleNotifier))?;

    match cli.command {
        Commands::Access { location, admin } => {
            let guard = ctx.session_guard();
            match guard.resolve_access(&location, admin).await {
                AccessOutcome::Granted(identity) => {
                    println!(
                        "granted: {} <{}>{}",
                        identity.subject_id,
                        identity.email,
                        if identity.is_admin { " (admin)" } else { "" }
                    );
                }
                AccessOutcome::DeniedRedirect { redirect, reason } => {
                    println!("redirect: {} ({})", redirect.location, reason.as_str());
                    return Ok(ExitCode::from(2));
                }
                AccessOutcome::Inert => println!("inert"),
            }
        }
        Commands::SignIn { email, password } => {
            let credential = match password {
                Some(password) => Credential::Password(password),
                None => Credential::MagicLink,
            };
            match ctx.session_guard().sign_in(&email, &credential).await? {
                SignInOutcome::SignedIn(session) => {
                    println!("signed in: {} until {}", session.subject_id(), session.expires_at());
                }
                SignInOutcome::LinkSent => println!("check your inbox for a sign-in link"),
            }
        }
        Commands::SignOut => {
            let redirect = ctx.session_guard().logout().await;
            println!("signed out, next: {}", redirect.location);
        }
        Commands::Upload {
            owner,
            file,
            profile,
            content_type,
        } => {
            let file = UploadFile::from_path(&file, content_type.as_deref()).await?;
            let pipeline = ctx.upload_pipeline();
            let receipt = match profile {
                Profile::Avatar => pipeline.upload_avatar(&owner, file).await?,
                Profile::General => pipeline.upload(&owner, file).await?,
                Profile::Proof => pipeline.upload_report_proof(&owner, file).await?,
            };
            println!("{} via {}", receipt.public_locator, receipt.strategy_used.as_str());
        }
        Commands::Load {
            resource,
            attempts,
            limit,
        } => {
            let loader = ctx.retry_loader();
            let mut query = Query::all();
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let max_attempts = attempts.unwrap_or(ctx.config().retry.max_attempts);
            let rows = loader.load_with_retry(&resource, &query, max_attempts).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Token => {
            println!("{}", ctx.tokens().token()?.as_str());
        }
        Commands::Watch => {
            let guard = Arc::new(ctx.session_guard());
            let location = ctx.config().auth.dashboard_path.clone();
            if let AccessOutcome::DeniedRedirect { redirect, reason } = guard.resolve_access(&location, false).await {
                println!("redirect: {} ({})", redirect.location, reason.as_str());
                return Ok(ExitCode::from(2));
            }

            let clock = ctx.activity_clock().clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(_)) = lines.next_line().await {
                    clock.touch(ActivityEvent::KeyPress);
                }
            });
            tokio::spawn(teardown_on_interrupt(ctx.teardown().clone()));

            let monitor = ctx.session_timeout(guard);
            if let Some(redirect) = monitor.run(ctx.teardown().subscribe()).await {
                println!("logged out, next: {}", redirect.location);
            }
        }
        Commands::CheckConfig | Commands::Sanitize { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}
