#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps
)]

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::Write;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use opengrasp::agent::{seed_workspace, BOOTSTRAP_FILES};
use opengrasp::config::generate_gateway_token;
use opengrasp::gateway;
use opengrasp::security::{hash_password, redact, AuthMode};
use opengrasp::{AuthCommands, Config};

fn parse_auth_mode(s: &str) -> std::result::Result<AuthMode, String> {
    s.parse::<AuthMode>().map_err(|e| format!("{e}"))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `OpenGrasp` - your machine, your agent, your rules.
#[derive(Parser, Debug)]
#[command(name = "opengrasp")]
#[command(version)]
#[command(about = "Local AI-assistant gateway with workspace memory.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server (REST + WebSocket chat)
    #[command(long_about = "\
Start the gateway server (REST + WebSocket chat).

Runs the HTTP/WebSocket gateway the dashboard and the one-shot agent \
command talk to. Bind address defaults to the values in your config \
file (gateway.bind / gateway.port).

Examples:
  opengrasp gateway                  # use config defaults
  opengrasp gateway -p 8080          # listen on port 8080
  opengrasp gateway --bind 0.0.0.0   # expose on all interfaces")]
    Gateway {
        /// Port to listen on; defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to; defaults to config gateway.bind
        #[arg(long)]
        bind: Option<String>,
    },

    /// Create the config file and seed the agent workspace
    #[command(long_about = "\
Create the config file and seed the agent workspace.

Writes a default config.toml (generating a gateway token under token \
mode), creates the workspace directory, and seeds the six bootstrap \
documents the agent reads on a session's first turn. Existing files \
are left alone unless --force is given.

Examples:
  opengrasp init
  opengrasp init --mode none        # open access on localhost
  opengrasp init --force            # re-seed bootstrap documents")]
    Init {
        /// Overwrite bootstrap documents that already exist
        #[arg(long)]
        force: bool,

        /// Auth mode to configure (none, token, password)
        #[arg(long, value_parser = parse_auth_mode)]
        mode: Option<AuthMode>,
    },

    /// Show config, auth, and workspace status
    Status,

    /// Send one message to a running gateway and print the reply
    #[command(long_about = "\
Send one message to a running gateway and print the reply.

Posts to /api/chat over HTTP. The gateway URL and bearer token default \
to the values in your config file, so against a local gateway only the \
message is needed.

Examples:
  opengrasp agent -m \"What did we decide yesterday?\"
  opengrasp agent -m \"deploy notes\" --session deploys
  opengrasp agent -m hi --url http://192.168.1.20:18789 --token <hex>")]
    Agent {
        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Session name (defaults to \"main\")
        #[arg(long)]
        session: Option<String>,

        /// Agent id (defaults to \"main\")
        #[arg(long)]
        agent: Option<String>,

        /// Gateway base URL; defaults to config bind/port
        #[arg(long)]
        url: Option<String>,

        /// Bearer token; defaults to config gateway.auth.token
        #[arg(long)]
        token: Option<String>,
    },

    /// Manage gateway auth (password, token)
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Print the dashboard URL
    Dashboard,

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `opengrasp`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(opengrasp completions bash)
  opengrasp completions zsh > ~/.zfunc/_opengrasp
  opengrasp completions fish > ~/.config/fish/completions/opengrasp.fish")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("OPENGRASP_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    // This avoids warnings/log lines corrupting sourced completion scripts.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // All other commands need config loaded first
    let mut config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Gateway { port, bind } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            info!(
                "🚀 Starting OpenGrasp gateway on {}:{}",
                config.gateway.bind, config.gateway.port
            );
            gateway::run_gateway(config).await
        }

        Commands::Init { force, mode } => {
            if let Some(mode) = mode {
                config.gateway.auth.mode = mode;
                if mode == AuthMode::Token && config.gateway.auth.token.is_empty() {
                    config.gateway.auth.token = generate_gateway_token();
                }
                config.save().await?;
            }

            let workspace = config.workspace_dir();
            let written = seed_workspace(&workspace, force).await?;

            println!("🦾 OpenGrasp initialized");
            println!();
            println!("Config:     {}", config.config_path.display());
            println!("Workspace:  {}", workspace.display());
            println!(
                "Seeded:     {}",
                if written.is_empty() {
                    "(all bootstrap files already present)".to_string()
                } else {
                    written.join(", ")
                }
            );
            println!("Auth mode:  {}", config.gateway.auth.mode.as_str());
            if config.gateway.auth.mode == AuthMode::Token {
                println!("Token:      {}", config.gateway.auth.token);
            }
            if config.gateway.auth.mode == AuthMode::Password
                && config.gateway.auth.password_hash.is_none()
            {
                println!();
                println!("No password set yet - run `opengrasp auth set-password`.");
            }
            Ok(())
        }

        Commands::Status => {
            let workspace = config.workspace_dir();
            println!("🦾 OpenGrasp Status");
            println!();
            println!("Version:    {}", env!("CARGO_PKG_VERSION"));
            println!("Config:     {}", config.config_path.display());
            println!(
                "Gateway:    http://{}:{}",
                config.gateway.bind, config.gateway.port
            );
            println!("Auth mode:  {}", config.gateway.auth.mode.as_str());
            if config.gateway.auth.mode == AuthMode::Token {
                // Full value via `opengrasp auth show-token`.
                println!("Token:      {}", redact(&config.gateway.auth.token));
            }
            println!(
                "Workspace:  {} {}",
                workspace.display(),
                if workspace.is_dir() {
                    "✅"
                } else {
                    "❌ (run `opengrasp init`)"
                }
            );
            println!();
            println!("Bootstrap documents:");
            for file in BOOTSTRAP_FILES {
                let present = workspace.join(file).is_file();
                println!("  {} {}", if present { "✅" } else { "❌" }, file);
            }
            Ok(())
        }

        Commands::Agent {
            message,
            session,
            agent,
            url,
            token,
        } => {
            let url = url.unwrap_or_else(|| {
                format!("http://{}:{}", config.gateway.bind, config.gateway.port)
            });
            let token = token.unwrap_or_else(|| config.gateway.auth.token.clone());

            let mut request = reqwest::Client::new()
                .post(format!("{}/api/chat", url.trim_end_matches('/')))
                .json(&json!({
                    "message": message,
                    "session": session,
                    "agent": agent,
                }));
            if !token.is_empty() {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("gateway unreachable at {url}"))?;
            let status = response.status();
            let body: serde_json::Value = response
                .json()
                .await
                .context("gateway returned a non-JSON response")?;

            if !status.is_success() {
                bail!(
                    "gateway error ({status}): {}",
                    body["error"].as_str().unwrap_or("unknown")
                );
            }
            println!("{}", body["message"]["content"].as_str().unwrap_or_default());
            Ok(())
        }

        Commands::Auth { auth_command } => match auth_command {
            AuthCommands::SetPassword => {
                let password = dialoguer::Password::new()
                    .with_prompt("New dashboard password")
                    .with_confirmation("Confirm password", "passwords do not match")
                    .interact()?;
                config.gateway.auth.password_hash = Some(hash_password(&password)?);
                config.gateway.auth.mode = AuthMode::Password;
                config.save().await?;
                println!("Password set. Auth mode is now \"password\".");
                Ok(())
            }
            AuthCommands::ShowToken => {
                if config.gateway.auth.token.is_empty() {
                    println!(
                        "No token set (auth mode is \"{}\").",
                        config.gateway.auth.mode.as_str()
                    );
                } else {
                    println!("{}", config.gateway.auth.token);
                }
                Ok(())
            }
            AuthCommands::RotateToken => {
                config.gateway.auth.token = generate_gateway_token();
                config.save().await?;
                println!("{}", config.gateway.auth.token);
                Ok(())
            }
        },

        Commands::Dashboard => {
            println!(
                "http://{}:{}/",
                config.gateway.bind, config.gateway.port
            );
            Ok(())
        }
    }
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
