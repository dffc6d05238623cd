//! Playlist acquisition: HTTP(S) or local file, parsed off the core
//! loop.
//!
//! Every load carries the generation it was started with; the core
//! drops results whose generation a newer reload has superseded, so a
//! slow download can never clobber a fresher catalog.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use zap_proto::playlist::parse_m3u;

use crate::core::CoreEvent;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no playlist source configured")]
    NoSource,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn fetch_playlist(source: &str) -> Result<String, LoadError> {
    if source.trim().is_empty() {
        return Err(LoadError::NoSource);
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        let resp = reqwest::get(source).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

/// Fetch and parse in a detached task, reporting back through the core
/// event channel.
pub fn spawn_load(source: String, generation: u64, event_tx: mpsc::Sender<CoreEvent>) {
    tokio::spawn(async move {
        info!("loader: fetching playlist gen={} from {}", generation, source);
        let result = match fetch_playlist(&source).await {
            Ok(text) => {
                let channels = parse_m3u(&text);
                info!("loader: parsed {} channels", channels.len());
                Ok(channels)
            }
            Err(e) => {
                warn!("loader: load failed: {}", e);
                Err(e)
            }
        };
        let _ = event_tx
            .send(CoreEvent::LoadFinished { generation, result })
            .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        assert!(matches!(
            fetch_playlist("").await,
            Err(LoadError::NoSource)
        ));
        assert!(matches!(
            fetch_playlist("   ").await,
            Err(LoadError::NoSource)
        ));
    }

    #[tokio::test]
    async fn test_local_file_roundtrip() {
        let path = std::env::temp_dir().join("tvzap-loader-test.m3u");
        let body = "#EXTM3U\n#EXTINF:-1 group-title=\"News\",CNN\nhttp://stream/cnn\n";
        tokio::fs::write(&path, body).await.unwrap();

        let text = fetch_playlist(path.to_str().unwrap()).await.unwrap();
        let channels = parse_m3u(&text);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "CNN");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        assert!(matches!(
            fetch_playlist("/nonexistent/tvzap.m3u").await,
            Err(LoadError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_spawn_load_reports_generation() {
        let path = std::env::temp_dir().join("tvzap-spawn-load-test.m3u");
        tokio::fs::write(&path, "#EXTINF:-1,One\nhttp://s/1\n")
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        spawn_load(path.to_string_lossy().into_owned(), 7, tx);
        match rx.recv().await {
            Some(CoreEvent::LoadFinished { generation, result }) => {
                assert_eq!(generation, 7);
                assert_eq!(result.unwrap().len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
