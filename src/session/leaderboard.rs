//! Leaderboard Collaborator
//!
//! Score persistence behind a trait so the session does not care whether
//! scores go to memory, a database or an HTTP service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Longest accepted player name, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// One stored score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Row id.
    pub id: Uuid,
    /// Display name.
    pub player_name: String,
    /// Final score.
    pub score: u64,
    /// When the score was stored.
    pub recorded_at: DateTime<Utc>,
}

/// Leaderboard errors.
#[derive(Debug, Clone, Error)]
pub enum LeaderboardError {
    /// Name empty, too long or unprintable.
    #[error("Invalid player name: {0}")]
    InvalidName(String),

    /// Backend could not be reached.
    #[error("Leaderboard unavailable: {0}")]
    Unavailable(String),
}

/// Score persistence.
pub trait LeaderboardStore: Send + Sync {
    /// Store a score.
    fn submit(&self, player_name: String, score: u64) -> BoxFuture<'_, Result<ScoreEntry, LeaderboardError>>;

    /// Best scores, highest first.
    fn top_scores(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ScoreEntry>, LeaderboardError>>;

    /// Best score stored so far.
    fn high_score(&self) -> BoxFuture<'_, Result<Option<u64>, LeaderboardError>>;
}

/// Leaderboard held in memory.
///
/// Entries are kept sorted by score (descending), ties broken by who got
/// there first.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaderboard {
    entries: Arc<RwLock<Vec<ScoreEntry>>>,
}

impl InMemoryLeaderboard {
    /// Create an empty leaderboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored scores.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn validate_name(name: &str) -> Result<String, LeaderboardError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LeaderboardError::InvalidName("empty".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(LeaderboardError::InvalidName(format!(
            "longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(LeaderboardError::InvalidName("control characters".into()));
    }
    Ok(trimmed.to_string())
}

impl LeaderboardStore for InMemoryLeaderboard {
    fn submit(&self, player_name: String, score: u64) -> BoxFuture<'_, Result<ScoreEntry, LeaderboardError>> {
        Box::pin(async move {
            let player_name = validate_name(&player_name)?;
            let entry = ScoreEntry {
                id: Uuid::new_v4(),
                player_name,
                score,
                recorded_at: Utc::now(),
            };

            let mut entries = self.entries.write().await;
            let position = entries.partition_point(|e| e.score >= score);
            entries.insert(position, entry.clone());

            debug!(player = %entry.player_name, score, rank = position + 1, "Score stored");
            Ok(entry)
        })
    }

    fn top_scores(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ScoreEntry>, LeaderboardError>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(entries.iter().take(limit).cloned().collect())
        })
    }

    fn high_score(&self) -> BoxFuture<'_, Result<Option<u64>, LeaderboardError>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(entries.first().map(|e| e.score))
        })
    }
}
