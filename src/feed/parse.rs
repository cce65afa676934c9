// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::error::FeedError;

/// One downloadable episode from a feed
#[derive(Debug, Clone)]
pub struct EpisodeMeta {
    pub title: String,
    pub audio_url: Url,
    pub pub_date: DateTime<FixedOffset>,
    pub duration: Option<String>,
    pub length: Option<u64>,
    pub description: String,
    /// Episode cover art, when the feed carries one
    pub image_url: Option<Url>,
}

/// Parse RSS feed XML into episode records.
///
/// Only items carrying an audio enclosure and a parseable publish date are
/// kept: the downloaded-since bookkeeping needs a date to compare against,
/// and undated items would be re-fetched every run.
pub fn parse_feed(xml_bytes: &[u8]) -> Result<Vec<EpisodeMeta>, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let episodes = channel
        .items()
        .iter()
        .filter_map(parse_episode)
        .collect();

    Ok(episodes)
}

/// Keep only episodes published strictly after `since`
pub fn filter_since(
    episodes: Vec<EpisodeMeta>,
    since: DateTime<FixedOffset>,
) -> Vec<EpisodeMeta> {
    episodes
        .into_iter()
        .filter(|e| e.pub_date > since)
        .collect()
}

/// Publish date of the oldest episode; seeds a new subscription so its
/// whole backlog is considered new
pub fn oldest_episode_date(episodes: &[EpisodeMeta]) -> Option<DateTime<FixedOffset>> {
    episodes.iter().map(|e| e.pub_date).min()
}

/// Publish date of the newest episode
pub fn newest_episode_date(episodes: &[EpisodeMeta]) -> Option<DateTime<FixedOffset>> {
    episodes.iter().map(|e| e.pub_date).max()
}

fn parse_episode(item: &rss::Item) -> Option<EpisodeMeta> {
    let enclosure = item.enclosure()?;
    if !is_audio(enclosure) {
        return None;
    }

    let audio_url = Url::parse(enclosure.url()).ok()?;
    let pub_date = item.pub_date().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str)
            .or_else(|_| parse_relaxed_date(date_str))
            .ok()
    })?;

    let title = item
        .title()
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let itunes = item.itunes_ext();

    Some(EpisodeMeta {
        title,
        audio_url,
        pub_date,
        duration: itunes.and_then(|ext| ext.duration().map(String::from)),
        length: enclosure.length().parse().ok(),
        description: clean_description(item.description().unwrap_or_default()),
        image_url: itunes
            .and_then(|ext| ext.image())
            .and_then(|u| Url::parse(u).ok()),
    })
}

fn is_audio(enclosure: &rss::Enclosure) -> bool {
    enclosure.mime_type().starts_with("audio/") || enclosure.url().ends_with(".mp3")
}

/// Strip markup and collapse whitespace so a description fits one log line
pub fn clean_description(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = html_escape::decode_html_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Ok(dt);
        }
    }

    Err(chrono::DateTime::parse_from_rfc2822("invalid").unwrap_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast for unit testing</description>
    <item>
      <title>Episode 1</title>
      <description>&lt;p&gt;First &amp;amp; finest&lt;/p&gt;
episode</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
      <itunes:duration>30:00</itunes:duration>
    </item>
    <item>
      <title>Episode 2</title>
      <pubDate>Mon, 08 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://example.com/ep2.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Video special</title>
      <pubDate>Mon, 15 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://example.com/special.mp4" type="video/mp4"/>
    </item>
    <item>
      <title>Undated</title>
      <enclosure url="https://example.com/undated.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_keeps_dated_audio_items_only() {
        let episodes = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();

        let titles: Vec<_> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Episode 1", "Episode 2"]);
    }

    #[test]
    fn parse_extracts_episode_fields() {
        let episodes = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();

        let ep = &episodes[0];
        assert_eq!(ep.title, "Episode 1");
        assert_eq!(ep.audio_url.as_str(), "https://example.com/ep1.mp3");
        assert_eq!(ep.duration, Some("30:00".to_string()));
        assert_eq!(ep.length, Some(1234567));
        assert_eq!(ep.description, "First & finest episode");
    }

    #[test]
    fn filter_since_is_strictly_after() {
        let episodes = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let since = DateTime::parse_from_rfc2822("Mon, 01 Jan 2024 12:00:00 +0000").unwrap();

        let fresh = filter_since(episodes, since);

        let titles: Vec<_> = fresh.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Episode 2"]);
    }

    #[test]
    fn oldest_and_newest_dates() {
        let episodes = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();

        let oldest = oldest_episode_date(&episodes).unwrap();
        let newest = newest_episode_date(&episodes).unwrap();
        assert_eq!(oldest.format("%Y-%m-%d").to_string(), "2024-01-01");
        assert_eq!(newest.format("%Y-%m-%d").to_string(), "2024-01-08");
    }

    #[test]
    fn oldest_date_of_empty_feed_is_none() {
        assert!(oldest_episode_date(&[]).is_none());
    }

    #[test]
    fn clean_description_strips_tags_and_collapses_whitespace() {
        assert_eq!(
            clean_description("<p>Hello\n  <b>world</b></p>   again"),
            "Hello world again"
        );
    }

    #[test]
    fn clean_description_decodes_entities() {
        assert_eq!(clean_description("tea &amp; biscuits"), "tea & biscuits");
    }

    #[test]
    fn mp3_url_counts_as_audio_without_mime() {
        let feed = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>T</title>
    <description>D</description>
    <item>
      <title>Ep</title>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://example.com/ep.mp3" type=""/>
    </item>
  </channel>
</rss>"#;

        let episodes = parse_feed(feed.as_bytes()).unwrap();
        assert_eq!(episodes.len(), 1);
    }
}
