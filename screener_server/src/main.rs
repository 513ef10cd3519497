use chrono::Utc;
use clap::Parser;
use screener_core::ScreenerConfig;
use screener_server::backends;
use screener_server::cli::{Cli, Commands, CursorCommand, IdentityCommand};
use screener_server::commands;

// One cooperative thread: at most one model call in flight process-wide.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = ScreenerConfig::from_env()?;
    screener_core::o11y::init_global(&cfg.o11y())?;
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let scheduler = backends::scheduler(&cfg).await?;
            scheduler.run_until(shutdown_signal()).await?;
        }
        Commands::Tick => {
            let store = backends::credential_store(&cfg).await?;
            let refresher = backends::refresher(&cfg, store)?;
            let pipeline = backends::pipeline(&cfg, refresher).await?;
            let report = pipeline.run_tick().await;
            print_json(&serde_json::to_value(&report)?)?;
        }
        Commands::RefreshTokens => {
            let store = backends::credential_store(&cfg).await?;
            let refresher = backends::refresher(&cfg, store)?;
            let report = refresher.sweep(Utc::now()).await?;
            print_json(&serde_json::json!({
                "refreshed": report.refreshed,
                "failed": report.failed,
            }))?;
            if !report.failed.is_empty() {
                anyhow::bail!("{} identities failed to refresh", report.failed.len());
            }
        }
        Commands::Identity { command } => {
            let store = backends::credential_store(&cfg).await?;
            let out = match command {
                IdentityCommand::Put {
                    account,
                    access_token,
                    refresh_token,
                } => {
                    commands::identity_put(
                        store.as_ref(),
                        cfg.token_lifetime,
                        &account,
                        &access_token,
                        &refresh_token,
                    )
                    .await?
                }
                IdentityCommand::List => commands::identity_list(store.as_ref()).await?,
            };
            print_json(&out)?;
        }
        Commands::Cursor { command } => {
            let storage = backends::cursor_storage(&cfg);
            let out = match command {
                CursorCommand::Show => commands::cursor_show(storage.as_ref()).await?,
                CursorCommand::Set { value } => commands::cursor_set(storage.as_ref(), value).await?,
            };
            print_json(&out)?;
        }
        Commands::Config => print_json(&cfg.redacted())?,
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
