use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refresher_core::{
    build_client, build_trackers, find_partial_updates, load_config, load_directory,
    validate_config, write_report, DirLock, Fetcher, HttpOpener, OutcomeKind, ProgressLine,
    RetryPolicy, TerminalReporter, Tracker, UpdateOptions, Updater,
};

/// Default configuration file, relative to the working directory
const DEFAULT_CONFIG: &str = "refresher.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging; events go to stderr after erasing any progress line
    let progress_line = ProgressLine::new();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(progress_line.clone()))
        .init();

    let config_path = config_path(
        std::env::args().nth(1),
        std::env::var("REFRESHER_CONFIG").ok(),
    );

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let torrents_dir = config.core.torrents_dir.clone();
    info!(
        "Configuration loaded: {} tracker(s), torrents in {:?}",
        config.trackers.len(),
        torrents_dir
    );

    let opener = HttpOpener::new(&config.fetch).context("Failed to create HTTP client")?;
    let fetcher = Fetcher::new(Arc::new(opener), RetryPolicy::from(&config.fetch));

    let trackers = build_trackers(&config.trackers, &fetcher).context("Failed to build trackers")?;

    let client = match &config.client {
        Some(client_config) => {
            info!("Initializing {} client", client_config.backend);
            Some(build_client(client_config).context("Failed to build torrent client")?)
        }
        None => {
            info!("No torrent client configured");
            None
        }
    };

    let _lock = if config.core.lock {
        Some(DirLock::acquire(&torrents_dir).context("Failed to lock torrents directory")?)
    } else {
        warn!("Directory lock disabled");
        None
    };

    start_sessions(&trackers).await?;

    for path in find_partial_updates(&torrents_dir)
        .await
        .context("Failed to scan for partial updates")?
    {
        warn!(
            "Partially applied update: {:?} has a .meta sidecar, its client entry needs restoring",
            path
        );
    }

    let torrents = load_directory(&torrents_dir)
        .await
        .with_context(|| format!("Failed to read {:?}", torrents_dir))?;

    let interactive = std::io::stdout().is_terminal();
    let mut reporter =
        TerminalReporter::stdout(config.core.show_diff, config.core.spinner && interactive);
    if interactive {
        reporter = reporter.with_line(progress_line);
    }
    let updater = Updater::new(trackers, client, UpdateOptions::from_config(&config));
    let summary = updater.run(torrents, &mut reporter).await?;

    if let Some(report_path) = &config.core.report_path {
        write_report(report_path, &summary)
            .await
            .with_context(|| format!("Failed to write report to {:?}", report_path))?;
    }

    info!(
        "Run complete: {} affected, {} tracker error(s), {} unhandled error(s)",
        summary.count(OutcomeKind::Affected),
        summary.count(OutcomeKind::TrackerError),
        summary.count(OutcomeKind::UnhandledError)
    );
    Ok(())
}

/// Run each tracker's startup hooks once: connectivity first, then login.
async fn start_sessions(trackers: &[Arc<dyn Tracker>]) -> Result<()> {
    for tracker in trackers {
        let Some(session) = tracker.session() else {
            continue;
        };
        session
            .test_connectivity()
            .await
            .with_context(|| format!("Tracker '{}' is unreachable", tracker.name()))?;
        session
            .login()
            .await
            .with_context(|| format!("Login to tracker '{}' failed", tracker.name()))?;
        info!("Tracker '{}' ready", tracker.name());
    }
    Ok(())
}

/// First CLI argument, else `REFRESHER_CONFIG`, else the default file.
fn config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use refresher_core::config::CheckKind;
    use refresher_core::testing::MockTracker;

    #[test]
    fn test_config_path_precedence() {
        assert_eq!(
            config_path(Some("a.toml".into()), Some("b.toml".into())),
            PathBuf::from("a.toml")
        );
        assert_eq!(config_path(None, Some("b.toml".into())), PathBuf::from("b.toml"));
        assert_eq!(config_path(None, None), PathBuf::from(DEFAULT_CONFIG));
    }

    #[tokio::test]
    async fn test_start_sessions_logs_in_once() {
        let with_session = Arc::new(MockTracker::new("a", "a", CheckKind::Hash).with_session());
        let without = Arc::new(MockTracker::new("b", "b", CheckKind::Hash));
        let trackers: Vec<Arc<dyn Tracker>> = vec![with_session.clone(), without.clone()];

        start_sessions(&trackers).await.unwrap();
        assert_eq!(with_session.login_calls(), 1);
        assert_eq!(without.login_calls(), 0);
    }
}
