//! # P1 CLI (`p1`)
//!
//! Terminal front end for the document question-answering service: ask
//! questions, browse conversation history, manage the tenant's documents,
//! and run the tenant-scoping edge proxy.
//!
//! ## Usage
//!
//! ```bash
//! p1 --config ./config/p1.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `p1 ask "<query>"` | Ask a question in the current conversation |
//! | `p1 chat` | Interactive question loop |
//! | `p1 conversations list\|show\|new` | Browse and start conversations |
//! | `p1 docs list\|upload\|index\|delete` | Manage the tenant's documents |
//! | `p1 settings show\|set\|reset` | View and change preferences |
//! | `p1 whoami` | Show backend, tenant, and token state |
//! | `p1 health` | Check the backend |
//! | `p1 token mint` | Mint a development token |
//! | `p1 serve edge` | Start the tenant-scoping proxy |
//! | `p1 completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Try it without a backend
//! p1 --offline ask "What was the total revenue in Q4 2024?"
//!
//! # Raw JSON, exit code 2 on a non-2xx answer
//! p1 ask "headcount?" --raw
//!
//! # Forget the topic but keep the conversation
//! p1 ask --reset
//!
//! # Upload and index a document
//! p1 docs upload ./Q4-2024-Financial-Report.pdf && p1 docs index
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use p1_client::app::{App, RESET_QUERY};
use p1_client::backend::Backend;
use p1_client::client::{resolve_tenant, ApiClient};
use p1_client::config::{self, Config};
use p1_client::mock::MockBackend;
use p1_client::models::{AuthState, QueryResponse};
use p1_client::render::{self, Style};
use p1_client::session::Session;
use p1_client::settings::SettingsPatch;
use p1_client::toast::ToastSink;
use p1_client::{edge, logging, token};

/// P1 CLI — ask questions of your documents from the terminal.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/p1.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "p1",
    about = "P1 — ask questions of your tenant's documents from the terminal",
    version,
    long_about = "P1 talks to a multi-tenant question-answering service that answers only from \
    uploaded documents. It renders direct answers, guided fallbacks, and refusals with their \
    citations, manages documents and conversations, and can run a tenant-scoping edge proxy."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/p1.toml`. A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./config/p1.toml")]
    config: PathBuf,

    /// Use the in-memory demo backend instead of HTTP.
    #[arg(long, global = true)]
    offline: bool,

    /// More log output (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ask a question.
    ///
    /// Continues the current conversation, or starts one. The answer is
    /// rendered with its mode badge and citations.
    Ask {
        /// The question.
        #[arg(required_unless_present = "reset")]
        query: Option<String>,

        /// Ask within this conversation instead of the current one.
        #[arg(long)]
        conversation: Option<String>,

        /// Ask the service for debug information.
        #[arg(long)]
        debug: bool,

        /// Print the raw JSON response; exit with code 2 on a non-2xx status.
        #[arg(long)]
        raw: bool,

        /// Send `new topic` to reset the conversation's topic.
        #[arg(long, conflicts_with = "query")]
        reset: bool,
    },

    /// Interactive question loop.
    ///
    /// Reads questions from stdin. `/new` starts a new conversation,
    /// `/history` lists conversations, `/quit` exits.
    Chat {
        /// Ask the service for debug information.
        #[arg(long)]
        debug: bool,
    },

    /// Browse conversation history.
    Conversations {
        #[command(subcommand)]
        action: ConversationsAction,
    },

    /// Manage the tenant's documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// View and change preferences.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show the backend, tenant, and token state.
    Whoami,

    /// Check that the backend is reachable.
    Health,

    /// Development token helpers.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConversationsAction {
    /// List conversations, most recent first.
    List,
    /// Show every turn of a conversation.
    Show {
        /// Conversation id.
        id: String,
    },
    /// Start a new conversation for the next question.
    New,
}

#[derive(Subcommand)]
enum DocsAction {
    /// List uploaded documents.
    List,
    /// Upload a PDF.
    ///
    /// Indexes it right away when `auto_index_documents` is on.
    Upload {
        /// Path to the file.
        path: PathBuf,
    },
    /// Index pending documents.
    Index,
    /// Delete a document.
    Delete {
        /// File name as shown by `p1 docs list`.
        filename: String,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print every setting.
    Show,
    /// Change a setting, e.g. `p1 settings set compact_view on`.
    Set { key: String, value: String },
    /// Restore the settings from the config file.
    Reset,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Mint an HS256 token for a local backend.
    ///
    /// The backend must share the secret. Never use this against production.
    Mint {
        /// Tenant to put in the `tenant_id` claim.
        #[arg(long)]
        tenant: String,
        /// Signing secret. Defaults to `api.jwt_secret` / `P1_JWT_SECRET`.
        #[arg(long)]
        secret: Option<String>,
        /// Token lifetime in days.
        #[arg(long, default_value_t = 7)]
        ttl_days: i64,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Start the tenant-scoping edge proxy.
    ///
    /// Binds to `[edge].bind` and forwards scoped requests to `[edge].upstream`.
    Edge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "p1", &mut io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match &cli.command {
        Commands::Token {
            action:
                TokenAction::Mint {
                    tenant,
                    secret,
                    ttl_days,
                },
        } => {
            let secret = secret
                .clone()
                .or_else(|| cfg.api.jwt_secret.clone())
                .context("No signing secret: pass --secret or set P1_JWT_SECRET")?;
            if *ttl_days <= 0 {
                bail!("--ttl-days must be > 0");
            }
            let ttl = chrono::TimeDelta::try_days(*ttl_days)
                .with_context(|| format!("--ttl-days {} is too large", ttl_days))?;
            let minted = token::mint_dev_token(tenant, &secret, ttl)
                .with_context(|| format!("--ttl-days {} is too large", ttl_days))?;
            println!("{}", minted);
            return Ok(());
        }
        Commands::Serve {
            service: ServeService::Edge,
        } => {
            return edge::run_edge(&cfg).await;
        }
        Commands::Whoami => {
            let backend = build_backend(&cfg, cli.offline)?;
            whoami(&cfg, backend.as_ref());
            return Ok(());
        }
        _ => {}
    }

    let backend = build_backend(&cfg, cli.offline)?;
    let session = Session::load(&cfg.session.path, cfg.settings)?;
    let mut app = App::new(backend, session, ToastSink::Stderr);
    let mut out = io::stdout();

    match cli.command {
        Commands::Ask {
            query,
            conversation,
            debug,
            raw,
            reset,
        } => {
            let query = if reset {
                RESET_QUERY.to_string()
            } else {
                query.unwrap_or_default()
            };
            if raw {
                let (status, body) = app
                    .submit_query_raw(&query, conversation.as_deref(), debug)
                    .await?;
                println!("{}", body);
                app.save_session()?;
                if !(200..300).contains(&status) {
                    std::process::exit(2);
                }
                return Ok(());
            }

            let resp = if reset {
                app.reset_topic(conversation.as_deref()).await?
            } else {
                app.submit_query(&query, conversation.as_deref(), debug)
                    .await?
            };
            match resp {
                Some(resp) => print_response(&mut out, &app, &resp, debug)?,
                None => bail!("Query must not be empty"),
            }
        }
        Commands::Chat { debug } => {
            run_chat(&mut app, debug).await?;
        }
        Commands::Conversations { action } => match action {
            ConversationsAction::List => {
                app.load_conversations().await;
                render::conversations(
                    &mut out,
                    app.conversations(),
                    app.selected_conversation_id(),
                    Utc::now(),
                    style(&app),
                )?;
            }
            ConversationsAction::Show { id } => {
                let style = style(&app);
                match app.select_conversation(&id).await {
                    Some(conv) => render::conversation(&mut out, conv, style)?,
                    None => bail!("Failed to load conversation {}", id),
                }
            }
            ConversationsAction::New => {
                app.new_conversation();
            }
        },
        Commands::Docs { action } => match action {
            DocsAction::List => {
                app.load_documents().await;
                render::documents(&mut out, app.documents(), style(&app))?;
            }
            DocsAction::Upload { path } => {
                let resp = app.upload_document(&path).await?;
                println!("Stored as {}", resp.stored_path);
            }
            DocsAction::Index => {
                app.trigger_indexing().await?;
            }
            DocsAction::Delete { filename, yes } => {
                app.load_documents().await;
                if !app.documents().iter().any(|d| d.filename == filename) {
                    bail!("No document named '{}'", filename);
                }
                let deleted = app
                    .delete_document(&filename, |prompt| yes || prompt_yes_no(prompt))
                    .await?;
                if !deleted {
                    println!("Cancelled");
                }
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                render::settings(&mut out, app.settings())?;
            }
            SettingsAction::Set { key, value } => {
                let patch = SettingsPatch::parse(&key, &value)?;
                app.update_settings(patch);
                render::settings(&mut out, app.settings())?;
            }
            SettingsAction::Reset => {
                app.reset_settings(cfg.settings);
                println!("Settings reset");
            }
        },
        Commands::Health => {
            let health = app
                .backend()
                .health()
                .await
                .with_context(|| format!("Health check against {} failed", app.backend().name()))?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Token { .. }
        | Commands::Serve { .. }
        | Commands::Whoami
        | Commands::Completions { .. } => {
            // Handled above (before the backend is built)
            unreachable!()
        }
    }

    app.save_session()?;
    Ok(())
}

fn build_backend(cfg: &Config, offline: bool) -> Result<Arc<dyn Backend>> {
    if offline || cfg.api.mock {
        Ok(Arc::new(MockBackend::seeded(&resolve_tenant(&cfg.api))))
    } else {
        Ok(Arc::new(ApiClient::new(&cfg.api)?))
    }
}

fn style(app: &App) -> Style {
    Style::from_settings(app.settings())
}

fn print_response(
    out: &mut impl Write,
    app: &App,
    resp: &QueryResponse,
    debug: bool,
) -> Result<()> {
    render::response(out, resp, style(app))?;
    if debug && !resp.debug.is_null() {
        writeln!(out)?;
        writeln!(out, "Debug")?;
        writeln!(out, "{}", serde_json::to_string_pretty(&resp.debug)?)?;
    }
    writeln!(out)?;
    writeln!(out, "conversation: {}", resp.conversation_id)?;
    Ok(())
}

async fn run_chat(app: &mut App, debug: bool) -> Result<()> {
    let mut out = io::stdout();
    println!("Ask a question. /new starts a new conversation, /history lists them, /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => app.new_conversation(),
            "/history" => {
                app.load_conversations().await;
                render::conversations(
                    &mut out,
                    app.conversations(),
                    app.selected_conversation_id(),
                    Utc::now(),
                    style(app),
                )?;
            }
            query => match app.submit_query(query, None, debug).await {
                Ok(Some(resp)) => {
                    writeln!(out)?;
                    print_response(&mut out, app, &resp, debug)?;
                    writeln!(out)?;
                }
                Ok(None) => {}
                // Already toasted; keep the loop going so the user can retry.
                Err(e) => tracing::debug!(error = %e, "chat query failed"),
            },
        }
        app.save_session()?;
    }
    Ok(())
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn whoami(cfg: &Config, backend: &dyn Backend) {
    let bearer = cfg.api.bearer_token();
    let state = match token::auth_state(bearer) {
        AuthState::Authenticated => "authenticated",
        AuthState::Unauthorized => "unauthorized (token has no tenant_id)",
        AuthState::Unauthenticated if bearer.is_some() => {
            "unauthenticated (token expired or unreadable)"
        }
        AuthState::Unauthenticated => "unauthenticated (no token)",
    };

    println!("backend: {}", backend.name());
    println!("tenant:  {}", backend.tenant_id());
    println!("auth:    {}", state);

    let expires = bearer
        .and_then(|t| token::decode_claims(t).ok())
        .and_then(|claims| claims.get("exp").and_then(|v| v.as_i64()))
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0));
    if let Some(exp) = expires {
        println!("expires: {}", exp.format("%Y-%m-%d %H:%M UTC"));
    }
}
