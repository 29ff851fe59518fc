//! In-memory [`TweetStore`], used by the test suite and by `--in-memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Comment, Tweet, User};
use crate::store::TweetStore;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tweets: HashMap<Uuid, Tweet>,
    comments: Vec<Comment>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.user_id, user);
    }

    pub async fn insert_comment(&self, comment: Comment) {
        self.tables.write().await.comments.push(comment);
    }
}

#[async_trait]
impl TweetStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_users(&self, user_ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn count_tweets(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().await.tweets.len())
    }

    async fn recent_tweets(&self, offset: usize, limit: usize) -> Result<Vec<Tweet>, StoreError> {
        let tables = self.tables.read().await;
        let mut tweets: Vec<Tweet> = tables.tweets.values().cloned().collect();
        tweets.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.tweet_id.cmp(&a.tweet_id))
        });
        Ok(tweets.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_tweet(&self, tweet_id: Uuid) -> Result<Option<Tweet>, StoreError> {
        Ok(self.tables.read().await.tweets.get(&tweet_id).cloned())
    }

    async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .tweets
            .insert(tweet.tweet_id, tweet.clone());
        Ok(())
    }

    async fn update_tweet(&self, tweet: &Tweet) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.tweets.get_mut(&tweet.tweet_id) else {
            return Ok(false);
        };
        stored.text = tweet.text.clone();
        stored.image = tweet.image.clone();
        stored.updated_at = tweet.updated_at;
        Ok(true)
    }

    async fn delete_tweet(&self, tweet: &Tweet) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.tweets.remove(&tweet.tweet_id);
        tables
            .comments
            .retain(|comment| comment.tweet_id != tweet.tweet_id);
        Ok(())
    }

    async fn comments_for(&self, tweet_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|comment| comment.tweet_id == tweet_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PAGE_SIZE;
    use chrono::{Duration, Utc};

    fn user(name: &str) -> User {
        let now = Utc::now();
        User {
            user_id: Uuid::new_v4(),
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn tweet_at(owner: &User, minutes_ago: i64) -> Tweet {
        let mut tweet = Tweet::new(owner, "hello!".into(), "hoge.png".into());
        tweet.created_at = Utc::now() - Duration::minutes(minutes_ago);
        tweet
    }

    #[tokio::test]
    async fn pages_are_newest_first() {
        let store = MemoryStore::new();
        let alice = user("alice");
        store.insert_user(alice.clone()).await;
        for minutes_ago in [30, 10, 50, 20, 40, 0, 60] {
            store
                .insert_tweet(&tweet_at(&alice, minutes_ago))
                .await
                .expect("insert");
        }

        let first = store.page(1).await.expect("page 1");
        let second = store.page(2).await.expect("page 2");

        assert_eq!(first.total_pages, 2);
        assert_eq!(first.tweets.len(), PAGE_SIZE);
        assert_eq!(second.tweets.len(), 2);
        let stamps: Vec<_> = first
            .tweets
            .iter()
            .chain(second.tweets.iter())
            .map(|t| t.tweet.created_at)
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] > w[1]));
        assert!(first
            .tweets
            .iter()
            .all(|t| t.user.as_ref().map(|u| u.username.as_str()) == Some("alice")));
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let store = MemoryStore::new();
        let alice = user("alice");
        store
            .insert_tweet(&tweet_at(&alice, 1))
            .await
            .expect("insert");

        let page = store.page(4).await.expect("page");
        assert!(page.tweets.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn update_after_delete_does_not_recreate_the_tweet() {
        let store = MemoryStore::new();
        let alice = user("alice");
        let tweet = tweet_at(&alice, 1);
        store.insert_tweet(&tweet).await.expect("insert");
        store.delete_tweet(&tweet).await.expect("delete");

        let mut edited = tweet.clone();
        edited.text = "fuga".into();
        assert!(!store.update_tweet(&edited).await.expect("update"));
        assert_eq!(store.find_tweet(tweet.tweet_id).await.expect("find"), None);
    }

    #[tokio::test]
    async fn delete_drops_comments() {
        let store = MemoryStore::new();
        let alice = user("alice");
        let tweet = tweet_at(&alice, 1);
        store.insert_tweet(&tweet).await.expect("insert");
        store
            .insert_comment(Comment {
                comment_id: Uuid::new_v4(),
                tweet_id: tweet.tweet_id,
                user_id: alice.user_id,
                text: "nice".into(),
                created_at: Utc::now(),
            })
            .await;

        store.delete_tweet(&tweet).await.expect("delete");

        assert!(store.comments_for(tweet.tweet_id).await.expect("comments").is_empty());
        assert_eq!(store.count_tweets().await.expect("count"), 0);
    }
}
