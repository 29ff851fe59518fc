//! Persistence seam for the feed.
//!
//! Handlers only see [`TweetStore`]. The Scylla-backed implementation lives in
//! [`crate::db`], the in-memory one in [`crate::memory`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    page_offset, total_pages, Author, Comment, CommentWithAuthor, Tweet, TweetPage,
    TweetWithAuthor, User, PAGE_SIZE,
};

pub type SharedStore = Arc<dyn TweetStore>;

#[async_trait]
pub trait TweetStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Users for the given ids. Unknown ids are skipped.
    async fn find_users(&self, user_ids: &[Uuid]) -> Result<Vec<User>, StoreError>;

    async fn count_tweets(&self) -> Result<usize, StoreError>;

    /// Tweets ordered by `created_at` descending, skipping `offset`.
    async fn recent_tweets(&self, offset: usize, limit: usize) -> Result<Vec<Tweet>, StoreError>;

    async fn find_tweet(&self, tweet_id: Uuid) -> Result<Option<Tweet>, StoreError>;

    async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), StoreError>;

    /// Persists `text`, `image` and `updated_at` of an existing tweet.
    /// Returns `false` when the tweet no longer exists; nothing is written then.
    async fn update_tweet(&self, tweet: &Tweet) -> Result<bool, StoreError>;

    /// Removes the tweet together with its comments.
    async fn delete_tweet(&self, tweet: &Tweet) -> Result<(), StoreError>;

    /// Comments on a tweet in insertion order.
    async fn comments_for(&self, tweet_id: Uuid) -> Result<Vec<Comment>, StoreError>;

    /// Looks up the authors of `user_ids` in one batch.
    async fn authors(&self, user_ids: Vec<Uuid>) -> Result<HashMap<Uuid, Author>, StoreError> {
        let mut ids = user_ids;
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = self.find_users(&ids).await?;
        debug!("Resolved {} of {} authors", users.len(), ids.len());
        Ok(users
            .iter()
            .map(|user| (user.user_id, Author::from(user)))
            .collect())
    }

    /// One page of the feed with authors attached.
    async fn page(&self, page: usize) -> Result<TweetPage, StoreError> {
        let count = self.count_tweets().await?;
        let offset = page_offset(page);
        let tweets = if offset >= count {
            Vec::new()
        } else {
            let tweets = self.recent_tweets(offset, PAGE_SIZE).await?;
            self.with_authors(tweets).await?
        };
        Ok(TweetPage {
            tweets,
            page,
            total_pages: total_pages(count),
        })
    }

    async fn with_authors(&self, tweets: Vec<Tweet>) -> Result<Vec<TweetWithAuthor>, StoreError> {
        let authors = self
            .authors(tweets.iter().map(|tweet| tweet.user_id).collect())
            .await?;
        Ok(tweets
            .into_iter()
            .map(|tweet| TweetWithAuthor {
                user: authors.get(&tweet.user_id).cloned(),
                tweet,
            })
            .collect())
    }

    async fn comments_with_authors(
        &self,
        tweet_id: Uuid,
    ) -> Result<Vec<CommentWithAuthor>, StoreError> {
        let comments = self.comments_for(tweet_id).await?;
        let authors = self
            .authors(comments.iter().map(|comment| comment.user_id).collect())
            .await?;
        Ok(comments
            .into_iter()
            .map(|comment| CommentWithAuthor {
                user: authors.get(&comment.user_id).cloned(),
                comment,
            })
            .collect())
    }
}
