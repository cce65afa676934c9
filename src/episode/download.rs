use futures::StreamExt;
use sha2::{Digest, Sha256};

use crate::error::DownloadError;
use crate::feed::EpisodeMeta;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// A fully received episode body, ready for tagging and staging
#[derive(Debug, Clone)]
pub struct DownloadedAudio {
    pub bytes: Vec<u8>,
    /// Hash of the received bytes; transfer re-verifies copies against it
    pub content_hash: String,
}

/// Download an episode's audio into memory.
///
/// The whole body is needed before staging anyway (tag touch-ups operate on
/// the complete byte stream), so this accumulates rather than spooling to
/// disk, reporting progress chunk by chunk.
pub async fn fetch_audio<C: HttpClient>(
    client: &C,
    episode: &EpisodeMeta,
    show: &str,
    reporter: &SharedProgressReporter,
) -> Result<DownloadedAudio, DownloadError> {
    let url = episode.audio_url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        show: show.to_string(),
        episode_title: episode.title.clone(),
        content_length: response.content_length,
    });

    let capacity = response
        .content_length
        .or(episode.length)
        .unwrap_or(0) as usize;
    let mut bytes = Vec::with_capacity(capacity);
    let mut hasher = Sha256::new();
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        hasher.update(&chunk);
        bytes.extend_from_slice(&chunk);

        reporter.report(ProgressEvent::DownloadProgress {
            episode_title: episode.title.clone(),
            bytes_downloaded: bytes.len() as u64,
            total_bytes: response.content_length,
        });
    }

    let content_hash = format!("sha256:{:x}", hasher.finalize());

    Ok(DownloadedAudio {
        bytes,
        content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::NoopReporter;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::DateTime;
    use url::Url;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }

        async fn probe(&self) -> bool {
            true
        }
    }

    fn make_episode() -> EpisodeMeta {
        EpisodeMeta {
            title: "Test Episode".to_string(),
            audio_url: Url::parse("https://example.com/episode.mp3").unwrap(),
            pub_date: DateTime::parse_from_rfc2822("Mon, 15 Jan 2024 12:00:00 +0000").unwrap(),
            duration: Some("30:00".to_string()),
            length: Some(1000),
            description: "A test episode".to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn fetch_returns_the_body() {
        let client = MockHttpClient {
            response_data: b"test audio content".to_vec(),
            status: 200,
        };
        let reporter = NoopReporter::shared();

        let audio = fetch_audio(&client, &make_episode(), "Test Show", &reporter)
            .await
            .unwrap();

        assert_eq!(audio.bytes, b"test audio content");
        assert!(audio.content_hash.starts_with("sha256:"));
    }

    #[tokio::test]
    async fn fetch_fails_on_http_error() {
        let client = MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
        };
        let reporter = NoopReporter::shared();

        let result = fetch_audio(&client, &make_episode(), "Test Show", &reporter).await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hash_is_stable_for_identical_bodies() {
        let client = MockHttpClient {
            response_data: b"same bytes".to_vec(),
            status: 200,
        };
        let reporter = NoopReporter::shared();

        let first = fetch_audio(&client, &make_episode(), "Show", &reporter)
            .await
            .unwrap();
        let second = fetch_audio(&client, &make_episode(), "Show", &reporter)
            .await
            .unwrap();

        assert_eq!(first.content_hash, second.content_hash);
    }
}
