// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{EpisodeMeta, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    Url::parse(url)?;
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    Ok(bytes)
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<Vec<EpisodeMeta>, FeedError> {
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use async_trait::async_trait;

    struct EmptyClient;

    #[async_trait]
    impl HttpClient for EmptyClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::new())
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let stream: ByteStream = Box::pin(futures::stream::empty());
            Ok(HttpResponse {
                status: 200,
                content_length: Some(0),
                body: stream,
            })
        }

        async fn probe(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn malformed_url_is_rejected_before_fetching() {
        let result = fetch_feed_bytes(&EmptyClient, "not a url").await;
        assert!(matches!(result, Err(FeedError::InvalidUrl(_))));
    }
}
