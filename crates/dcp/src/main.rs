use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use dcp_core::{
    config::Config,
    ports::TokioSleeper,
    sweep::{SweepReport, SweepSettings, Sweeper},
    Error,
};
use dcp_discord::DiscordClient;

const EXIT_RUNTIME: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

/// Delete every message in a Discord channel.
///
/// Reads the bot token from DISCORD_TOKEN (or ./.env).
#[derive(Debug, Parser)]
#[command(name = "dcp", version)]
struct Cli {
    /// Channel to purge (17-19 digit id).
    channel_id: String,

    /// Page through the channel and count, without deleting.
    #[arg(long)]
    dry_run: bool,

    /// Seconds to wait after each delete. Overrides DELETE_DELAY.
    #[arg(long, value_name = "SECONDS")]
    delay: Option<f64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = dcp_core::logging::init("dcp") {
        eprintln!("{e}");
    }

    let result = purge(&cli).await;
    match &result {
        Ok(report) => print!("{report}"),
        Err(e @ Error::Config(_)) => eprintln!("error: {e}"),
        Err(e) => eprintln!("error: purge aborted: {e}"),
    }
    ExitCode::from(exit_code(&result))
}

async fn purge(cli: &Cli) -> Result<SweepReport, Error> {
    let cfg = load_config(cli)?;
    let client = DiscordClient::from_config(&cfg)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current message");
                cancel.cancel();
            }
        });
    }

    Sweeper::new(
        Arc::new(client),
        Arc::new(TokioSleeper),
        SweepSettings::from(&cfg),
    )
    .with_cancellation(cancel)
    .run(&cfg.channel)
    .await
}

/// 0 done (nothing to delete included), 2 bad config or id, 130 interrupted,
/// 1 anything that aborted the run.
fn exit_code(result: &Result<SweepReport, Error>) -> u8 {
    match result {
        Ok(report) if report.cancelled => EXIT_CANCELLED,
        Ok(_) => 0,
        Err(Error::Config(_)) => EXIT_USAGE,
        Err(_) => EXIT_RUNTIME,
    }
}

fn load_config(cli: &Cli) -> Result<Config, Error> {
    let mut cfg = Config::load(&cli.channel_id)?;
    if let Some(secs) = cli.delay {
        cfg = cfg.with_delete_delay_secs(secs)?;
    }
    cfg.dry_run = cli.dry_run;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_channel_and_flags() {
        let cli = Cli::try_parse_from(["dcp", "123456789012345678", "--dry-run", "--delay", "1.5"])
            .unwrap();
        assert_eq!(cli.channel_id, "123456789012345678");
        assert!(cli.dry_run);
        assert_eq!(cli.delay, Some(1.5));
    }

    #[test]
    fn exit_codes_follow_the_outcome() {
        let empty = SweepReport::default();
        assert!(empty.nothing_to_delete());
        assert_eq!(exit_code(&Ok(empty)), 0);

        let done = SweepReport {
            deleted: 37,
            failed: 2,
            batches: 1,
            fetches: 1,
            ..SweepReport::default()
        };
        assert_eq!(exit_code(&Ok(done)), 0);

        let cancelled = SweepReport {
            deleted: 5,
            batches: 1,
            fetches: 1,
            cancelled: true,
            ..SweepReport::default()
        };
        assert_eq!(exit_code(&Ok(cancelled)), 130);

        let malformed = Err(Error::MalformedResponse("expected a JSON array".into()));
        assert_eq!(exit_code(&malformed), 1);

        let transport = Err(Error::Transport("connection refused".into()));
        assert_eq!(exit_code(&transport), 1);

        let config = Err(Error::Config("DISCORD_TOKEN environment variable is required".into()));
        assert_eq!(exit_code(&config), 2);
    }

    #[test]
    fn malformed_channel_argument_maps_to_usage_exit() {
        let cli = Cli::try_parse_from(["dcp", " 123456789012345678"]).unwrap();
        let result = load_config(&cli).map(|_| SweepReport::default());
        assert_eq!(exit_code(&result), 2);
    }

    #[test]
    fn channel_is_required() {
        assert!(Cli::try_parse_from(["dcp"]).is_err());
    }
}
