use std::sync::Arc;

use anyhow::{Context, Result};
use offbeat_analysis::{AnalysisOutput, Playlist, PlaylistAnalyzer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod insights;

use config::Config;
use insights::InsightsPayload;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offbeat_insights=info,offbeat_analysis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!(
        environment = %config.common.environment,
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        "Starting OffBeat insights export"
    );

    let playlists = load_playlists(&config).await?;
    let analyzer = Arc::new(PlaylistAnalyzer::new(config.analysis().clone())?);
    let analyses = analyze_all(&analyzer, playlists).await?;

    let payload = InsightsPayload::build(&analyses, config.analysis().compare_top_n);
    let json = serde_json::to_string_pretty(&payload).context("Failed to serialize insights")?;
    tokio::fs::write(&config.output_path, json)
        .await
        .with_context(|| format!("Failed to write {}", config.output_path.display()))?;

    for insights in &payload.playlists {
        tracing::info!(
            playlist = %insights.playlist_name,
            moods = insights.moods.len(),
            clustered = insights.moods.values().map(|m| m.size).sum::<usize>(),
            anomalies = insights.anomalies.len(),
            "Playlist insights written"
        );
    }
    tracing::info!(
        num_playlists = payload.num_playlists,
        output = %config.output_path.display(),
        "Insights export complete"
    );

    Ok(())
}

async fn load_playlists(config: &Config) -> Result<Vec<Playlist>> {
    let raw = tokio::fs::read_to_string(&config.input_path)
        .await
        .with_context(|| format!("Failed to read {}", config.input_path.display()))?;
    let playlists: Vec<Playlist> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid playlist export in {}", config.input_path.display()))?;

    tracing::info!(num_playlists = playlists.len(), "Loaded enriched playlists");
    Ok(playlists)
}

/// Analyze every playlist on the blocking pool, preserving input order
async fn analyze_all(
    analyzer: &Arc<PlaylistAnalyzer>,
    playlists: Vec<Playlist>,
) -> Result<Vec<Arc<AnalysisOutput>>> {
    let handles: Vec<_> = playlists
        .into_iter()
        .map(|playlist| {
            let analyzer = Arc::clone(analyzer);
            tokio::task::spawn_blocking(move || {
                analyzer
                    .analyze(&playlist)
                    .with_context(|| format!("Failed to analyze playlist {}", playlist.id))
            })
        })
        .collect();

    let mut analyses = Vec::with_capacity(handles.len());
    for handle in handles {
        analyses.push(handle.await.context("Analysis task panicked")??);
    }
    Ok(analyses)
}
