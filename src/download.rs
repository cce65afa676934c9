// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{Duration, Utc};

use crate::config::Config;
use crate::device::Lockfile;
use crate::episode::{PendingFragment, Stager, fetch_audio};
use crate::error::{EpisodeError, RunError};
use crate::feed::{EpisodeMeta, fetch_feed, filter_since};
use crate::http::HttpClient;
use crate::journal::JobLog;
use crate::notify::run_notifier;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::store::{Selector, SortOrder, Subscription, SubscriptionStore};
use crate::tag::Tagger;

/// Options for a download run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restrict the run to one subscription, by id or name.
    /// A targeted run downloads even a disabled subscription.
    pub target: Option<Selector>,
    /// Cap the backlog window to the last year
    pub single_year: bool,
}

/// Result of a download run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Episodes staged successfully
    pub downloaded: usize,
    /// Episodes (or whole feeds) that failed
    pub failed: usize,
    /// Details of failures (title, error message)
    pub failures: Vec<(String, String)>,
}

/// Download every new episode and stage it for the next transfer.
///
/// Takes the shared lock for the whole run, walks subscriptions in name
/// order, filters each feed against its last-downloaded date, stages what
/// arrives, and finally flushes the sorted playlist fragment. A feed or
/// episode failure is recorded and the run carries on; only preconditions
/// and fragment persistence abort it.
pub async fn run_downloads<C: HttpClient>(
    config: &Config,
    store: &SubscriptionStore,
    client: &C,
    tagger: &dyn Tagger,
    journal: &JobLog,
    options: &RunOptions,
    reporter: SharedProgressReporter,
) -> Result<RunReport, RunError> {
    let lock = Lockfile::new(config.lock_path());
    if lock.is_held() {
        return Err(RunError::Busy);
    }
    if !client.probe().await {
        return Err(RunError::Offline);
    }
    let _guard = lock.acquire()?;

    let subscriptions = store.list(SortOrder::Name)?;
    let stager = Stager::new(config, tagger);
    let mut fragment = PendingFragment::default();
    let mut report = RunReport::default();

    for subscription in subscriptions.iter().filter(|s| selected(s, options)) {
        reporter.report(ProgressEvent::FetchingFeed {
            show: subscription.name.clone(),
            url: subscription.feed_url.clone(),
        });

        let episodes = match fetch_feed(client, &subscription.feed_url).await {
            Ok(episodes) => episodes,
            Err(e) => {
                report.failed += 1;
                report
                    .failures
                    .push((subscription.name.clone(), e.to_string()));
                continue;
            }
        };

        let mut since = subscription.last_downloaded.fixed_offset();
        if options.single_year {
            since = since.max((Utc::now() - Duration::days(365)).fixed_offset());
        }
        let fresh = filter_since(episodes, since);

        reporter.report(ProgressEvent::FeedChecked {
            show: subscription.name.clone(),
            new_episodes: fresh.len(),
        });

        let mut newest = subscription.last_downloaded;
        let mut staged_any = false;

        for episode in &fresh {
            match stage_episode(client, &stager, subscription, episode, &reporter).await {
                Ok(staged_path) => {
                    fragment.add(&subscription.name, episode.pub_date, staged_path.clone());
                    newest = newest.max(episode.pub_date.with_timezone(&Utc));
                    staged_any = true;
                    report.downloaded += 1;

                    let filename = staged_path
                        .rsplit('/')
                        .next()
                        .unwrap_or(staged_path.as_str());
                    let _ = journal.download(
                        &episode.title,
                        filename,
                        episode.duration.as_deref().unwrap_or("??:??"),
                        &episode.description,
                    );
                }
                Err(e) => {
                    reporter.report(ProgressEvent::EpisodeFailed {
                        show: subscription.name.clone(),
                        episode_title: episode.title.clone(),
                        error: e.to_string(),
                    });
                    report.failed += 1;
                    report.failures.push((episode.title.clone(), e.to_string()));
                }
            }
        }

        if staged_any {
            store.update_last_downloaded(subscription.id, newest)?;
        }
    }

    fragment.flush(&config.fragment_path())?;

    reporter.report(ProgressEvent::RunCompleted {
        downloaded: report.downloaded,
        failed: report.failed,
    });
    run_notifier(config);

    Ok(report)
}

fn selected(subscription: &Subscription, options: &RunOptions) -> bool {
    match &options.target {
        Some(Selector::Id(id)) => subscription.id == *id,
        Some(Selector::Name(name)) => &subscription.name == name,
        None => subscription.enabled,
    }
}

async fn stage_episode<C: HttpClient>(
    client: &C,
    stager: &Stager<'_>,
    subscription: &Subscription,
    episode: &EpisodeMeta,
    reporter: &SharedProgressReporter,
) -> Result<String, EpisodeError> {
    let audio = fetch_audio(client, episode, &subscription.name, reporter).await?;

    // Cover art is a nicety; a failed fetch only skips the embed
    let cover = match &episode.image_url {
        Some(url) => client.get_bytes(url.as_str()).await.ok(),
        None => None,
    };

    let staged_path = stager.stage(
        &audio.bytes,
        &subscription.name,
        &episode.title,
        episode.pub_date,
        cover.as_deref(),
    )?;

    reporter.report(ProgressEvent::EpisodeStaged {
        show: subscription.name.clone(),
        episode_title: episode.title.clone(),
        staged_path: staged_path.clone(),
    });

    Ok(staged_path)
}
