//! In-memory collaborators for pull engine tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::feed::{FeedFetcher, FetchError, FetchedFeed};
use crate::storage::{
    FailureState, Feed, FeedFilter, FeedStore, FeedUpdate, ItemStore, NewItem, RequestOptions,
    StorageError,
};

/// A feed that is due: no failure recorded, last touched an hour ago.
pub fn feed(id: i64, link: &str) -> Feed {
    Feed {
        id,
        name: Some(format!("Feed {id}")),
        link: Some(link.to_string()),
        last_build: None,
        failure: FailureState::Succeeded,
        suspended: false,
        updated_at: Utc::now() - ChronoDuration::hours(1),
        request_options: RequestOptions::default(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Insert(Vec<NewItem>),
    Update(i64, FeedUpdate),
}

/// Feed and item store that records every write in call order.
#[derive(Default)]
pub struct RecordingStore {
    feeds: Mutex<Vec<Feed>>,
    calls: Mutex<Vec<StoreCall>>,
    list_calls: AtomicUsize,
    fail_list: bool,
    fail_inserts: bool,
    fail_updates: bool,
    list_delay: Option<Duration>,
    update_delay: Option<Duration>,
}

impl RecordingStore {
    pub fn with_feeds(feeds: Vec<Feed>) -> Self {
        Self {
            feeds: Mutex::new(feeds),
            ..Self::default()
        }
    }

    pub fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn fail_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub fn fail_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn updated_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Update(id, _) => Some(id),
                StoreCall::Insert(_) => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl FeedStore for RecordingStore {
    async fn list(&self, filter: &FeedFilter) -> Result<Vec<Feed>, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list {
            return Err(StorageError::Locked);
        }
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds
            .iter()
            .filter(|f| filter.suspended.map_or(true, |s| f.suspended == s))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Feed, StorageError> {
        let feeds = self.feeds.lock().unwrap();
        feeds
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    async fn update(&self, id: i64, update: &FeedUpdate) -> Result<(), StorageError> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Update(id, update.clone()));
        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates {
            return Err(StorageError::Locked);
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for RecordingStore {
    async fn insert(&self, items: &[NewItem]) -> Result<u64, StorageError> {
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Insert(items.to_vec()));
        if self.fail_inserts {
            return Err(StorageError::Locked);
        }
        Ok(items.len() as u64)
    }
}

#[derive(Debug, Clone)]
pub enum FetchScript {
    Feed(FetchedFeed),
    Status(u16),
    Delayed(Duration, FetchedFeed),
}

/// Fetcher answering from a per-URL script. Unscripted URLs get a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, FetchScript>,
    requests: Mutex<Vec<(String, RequestOptions)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, feed: &Feed, script: FetchScript) -> Self {
        let link = feed.link.clone().unwrap_or_default();
        self.scripts.insert(link, script);
        self
    }

    pub fn requests(&self) -> Vec<(String, RequestOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<FetchedFeed, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        match self.scripts.get(url).cloned() {
            Some(FetchScript::Feed(fetched)) => Ok(fetched),
            Some(FetchScript::Status(code)) => Err(FetchError::HttpStatus(code)),
            Some(FetchScript::Delayed(delay, fetched)) => {
                tokio::time::sleep(delay).await;
                Ok(fetched)
            }
            None => Err(FetchError::HttpStatus(404)),
        }
    }
}
