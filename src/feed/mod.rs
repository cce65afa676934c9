mod fetch;
mod parse;

pub use fetch::{fetch_feed, fetch_feed_bytes};
pub use parse::{
    EpisodeMeta, clean_description, filter_since, newest_episode_date, oldest_episode_date,
    parse_feed,
};
