//! ScyllaDB-backed [`TweetStore`].
//!
//! Recency ordering lives in `tweet_timeline`, a single-partition index
//! clustered by `created_at DESC`. See `schema.cql` for the tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use scylla::batch::{Batch, BatchType};
use scylla::frame::response::result::{CqlValue, Row};
use scylla::frame::value::CqlTimestamp;
use scylla::{QueryResult, Session, SessionBuilder};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Comment, Tweet, User};
use crate::store::TweetStore;

/// Partition key shared by every row of `tweet_timeline`.
const TIMELINE_BUCKET: i32 = 0;

pub async fn create_session(nodes: &[String], keyspace: &str) -> Result<Session, StoreError> {
    let session = SessionBuilder::new().known_nodes(nodes).build().await?;
    session.use_keyspace(keyspace, false).await?;
    info!("Connected to ScyllaDB keyspace {}", keyspace);
    Ok(session)
}

pub struct ScyllaStore {
    session: Session,
}

impl ScyllaStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Writes a user row. Users belong to the identity provider; this is
    /// only used to load fixtures.
    pub async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.session
            .query(
                "INSERT INTO users (user_id, username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
                (
                    user.user_id,
                    &user.username,
                    &user.email,
                    &user.password_hash,
                    to_cql_timestamp(user.created_at),
                    to_cql_timestamp(user.updated_at),
                ),
            )
            .await?;
        Ok(())
    }

    /// Writes a comment row. Comments are authored elsewhere; this is only
    /// used to load fixtures.
    pub async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.session
            .query(
                "INSERT INTO comments_by_tweet (tweet_id, created_at, comment_id, user_id, text) VALUES (?, ?, ?, ?, ?)",
                (
                    comment.tweet_id,
                    to_cql_timestamp(comment.created_at),
                    comment.comment_id,
                    comment.user_id,
                    &comment.text,
                ),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TweetStore for ScyllaStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let result = self
            .session
            .query(
                "SELECT user_id, username, email, password_hash, created_at, updated_at FROM users WHERE user_id = ?",
                (user_id,),
            )
            .await?;
        rows(result).iter().map(user_from_row).next().transpose()
    }

    async fn find_users(&self, user_ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let result = self
            .session
            .query(
                "SELECT user_id, username, email, password_hash, created_at, updated_at FROM users WHERE user_id IN ?",
                (user_ids.to_vec(),),
            )
            .await?;
        rows(result).iter().map(user_from_row).collect()
    }

    async fn count_tweets(&self) -> Result<usize, StoreError> {
        let result = self
            .session
            .query(
                "SELECT COUNT(*) FROM tweet_timeline WHERE bucket = ?",
                (TIMELINE_BUCKET,),
            )
            .await?;
        let count = rows(result)
            .first()
            .and_then(|row| match column(row, 0) {
                Some(CqlValue::BigInt(count)) => Some(*count),
                _ => None,
            })
            .ok_or_else(|| StoreError::row("tweet_timeline", "missing count"))?;
        usize::try_from(count).map_err(|_| StoreError::row("tweet_timeline", "negative count"))
    }

    async fn recent_tweets(&self, offset: usize, limit: usize) -> Result<Vec<Tweet>, StoreError> {
        // CQL has no OFFSET, so read through the end of the page and skip.
        let through = i32::try_from(offset.saturating_add(limit)).unwrap_or(i32::MAX);
        let result = self
            .session
            .query(
                "SELECT tweet_id FROM tweet_timeline WHERE bucket = ? LIMIT ?",
                (TIMELINE_BUCKET, through),
            )
            .await?;
        let tweet_ids = rows(result)
            .iter()
            .skip(offset)
            .map(|row| uuid_at(row, 0, "tweet_timeline"))
            .collect::<Result<Vec<_>, _>>()?;
        if tweet_ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .session
            .query(
                "SELECT tweet_id, user_id, text, image, created_at, updated_at FROM tweets WHERE tweet_id IN ?",
                (tweet_ids.clone(),),
            )
            .await?;
        let mut tweets = rows(result)
            .iter()
            .map(tweet_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        // IN returns partition order; restore timeline order.
        tweets.sort_by_key(|tweet| {
            tweet_ids
                .iter()
                .position(|id| *id == tweet.tweet_id)
                .unwrap_or(usize::MAX)
        });
        debug!("Loaded {} tweets at offset {}", tweets.len(), offset);
        Ok(tweets)
    }

    async fn find_tweet(&self, tweet_id: Uuid) -> Result<Option<Tweet>, StoreError> {
        let result = self
            .session
            .query(
                "SELECT tweet_id, user_id, text, image, created_at, updated_at FROM tweets WHERE tweet_id = ?",
                (tweet_id,),
            )
            .await?;
        rows(result).iter().map(tweet_from_row).next().transpose()
    }

    async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), StoreError> {
        let created_at = to_cql_timestamp(tweet.created_at);
        self.session
            .batch(
                &insert_tweet_batch(),
                (
                    (
                        tweet.tweet_id,
                        tweet.user_id,
                        &tweet.text,
                        &tweet.image,
                        created_at,
                        to_cql_timestamp(tweet.updated_at),
                    ),
                    (TIMELINE_BUCKET, created_at, tweet.tweet_id),
                ),
            )
            .await?;
        Ok(())
    }

    async fn update_tweet(&self, tweet: &Tweet) -> Result<bool, StoreError> {
        let result = self
            .session
            .query(
                UPDATE_TWEET,
                (
                    &tweet.text,
                    &tweet.image,
                    to_cql_timestamp(tweet.updated_at),
                    tweet.tweet_id,
                ),
            )
            .await?;
        let applied = was_applied(&rows(result))?;
        if !applied {
            debug!("Tweet {} vanished before its update", tweet.tweet_id);
        }
        Ok(applied)
    }

    async fn delete_tweet(&self, tweet: &Tweet) -> Result<(), StoreError> {
        self.session
            .batch(
                &delete_tweet_batch(),
                (
                    (
                        TIMELINE_BUCKET,
                        to_cql_timestamp(tweet.created_at),
                        tweet.tweet_id,
                    ),
                    (tweet.tweet_id,),
                    (tweet.tweet_id,),
                ),
            )
            .await?;
        Ok(())
    }

    async fn comments_for(&self, tweet_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let result = self
            .session
            .query(
                "SELECT comment_id, tweet_id, user_id, text, created_at FROM comments_by_tweet WHERE tweet_id = ?",
                (tweet_id,),
            )
            .await?;
        rows(result).iter().map(comment_from_row).collect()
    }
}

/// Conditional so an update racing a delete cannot recreate a partial row.
const UPDATE_TWEET: &str =
    "UPDATE tweets SET text = ?, image = ?, updated_at = ? WHERE tweet_id = ? IF EXISTS";

/// The tweet row and its timeline entry, written together.
fn insert_tweet_batch() -> Batch {
    let mut batch = Batch::new(BatchType::Logged);
    batch.append_statement(
        "INSERT INTO tweets (tweet_id, user_id, text, image, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    );
    batch.append_statement(
        "INSERT INTO tweet_timeline (bucket, created_at, tweet_id) VALUES (?, ?, ?)",
    );
    batch
}

/// The timeline entry, the comments and the tweet row, removed together.
fn delete_tweet_batch() -> Batch {
    let mut batch = Batch::new(BatchType::Logged);
    batch.append_statement(
        "DELETE FROM tweet_timeline WHERE bucket = ? AND created_at = ? AND tweet_id = ?",
    );
    batch.append_statement("DELETE FROM comments_by_tweet WHERE tweet_id = ?");
    batch.append_statement("DELETE FROM tweets WHERE tweet_id = ?");
    batch
}

/// Reads the `[applied]` column of a lightweight-transaction result.
fn was_applied(rows: &[Row]) -> Result<bool, StoreError> {
    match rows.first().and_then(|row| column(row, 0)) {
        Some(CqlValue::Boolean(applied)) => Ok(*applied),
        other => Err(StoreError::row(
            "tweets",
            format!("expected [applied] flag, got {other:?}"),
        )),
    }
}

fn rows(result: QueryResult) -> Vec<Row> {
    result.rows.unwrap_or_default()
}

fn column(row: &Row, idx: usize) -> Option<&CqlValue> {
    row.columns.get(idx).and_then(Option::as_ref)
}

fn uuid_at(row: &Row, idx: usize, table: &'static str) -> Result<Uuid, StoreError> {
    match column(row, idx) {
        Some(CqlValue::Uuid(uuid)) => Ok(*uuid),
        other => Err(StoreError::row(
            table,
            format!("column {idx}: expected uuid, got {other:?}"),
        )),
    }
}

fn text_at(row: &Row, idx: usize, table: &'static str) -> Result<String, StoreError> {
    match column(row, idx) {
        Some(CqlValue::Text(text)) | Some(CqlValue::Ascii(text)) => Ok(text.clone()),
        // Unset text columns come back as null.
        None => Ok(String::new()),
        other => Err(StoreError::row(
            table,
            format!("column {idx}: expected text, got {other:?}"),
        )),
    }
}

fn timestamp_at(row: &Row, idx: usize, table: &'static str) -> Result<DateTime<Utc>, StoreError> {
    match column(row, idx) {
        Some(CqlValue::Timestamp(ts)) => from_cql_timestamp(*ts)
            .ok_or_else(|| StoreError::row(table, format!("column {idx}: timestamp out of range"))),
        other => Err(StoreError::row(
            table,
            format!("column {idx}: expected timestamp, got {other:?}"),
        )),
    }
}

fn to_cql_timestamp(at: DateTime<Utc>) -> CqlTimestamp {
    CqlTimestamp(at.timestamp_millis())
}

fn from_cql_timestamp(ts: CqlTimestamp) -> Option<DateTime<Utc>> {
    let millis = ts.0;
    let seconds = millis.div_euclid(1000);
    let nanos = u32::try_from(millis.rem_euclid(1000) * 1_000_000).ok()?;
    DateTime::<Utc>::from_timestamp(seconds, nanos)
}

fn user_from_row(row: &Row) -> Result<User, StoreError> {
    Ok(User {
        user_id: uuid_at(row, 0, "users")?,
        username: text_at(row, 1, "users")?,
        email: text_at(row, 2, "users")?,
        password_hash: text_at(row, 3, "users")?,
        created_at: timestamp_at(row, 4, "users")?,
        updated_at: timestamp_at(row, 5, "users")?,
    })
}

fn tweet_from_row(row: &Row) -> Result<Tweet, StoreError> {
    Ok(Tweet {
        tweet_id: uuid_at(row, 0, "tweets")?,
        user_id: uuid_at(row, 1, "tweets")?,
        text: text_at(row, 2, "tweets")?,
        image: text_at(row, 3, "tweets")?,
        created_at: timestamp_at(row, 4, "tweets")?,
        updated_at: timestamp_at(row, 5, "tweets")?,
    })
}

fn comment_from_row(row: &Row) -> Result<Comment, StoreError> {
    Ok(Comment {
        comment_id: uuid_at(row, 0, "comments_by_tweet")?,
        tweet_id: uuid_at(row, 1, "comments_by_tweet")?,
        user_id: uuid_at(row, 2, "comments_by_tweet")?,
        text: text_at(row, 3, "comments_by_tweet")?,
        created_at: timestamp_at(row, 4, "comments_by_tweet")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scylla::batch::BatchStatement;

    fn tweet_row(text: Option<CqlValue>) -> Row {
        Row {
            columns: vec![
                Some(CqlValue::Uuid(Uuid::nil())),
                Some(CqlValue::Uuid(Uuid::nil())),
                text,
                Some(CqlValue::Text("hoge.png".into())),
                Some(CqlValue::Timestamp(CqlTimestamp(1_700_000_000_123))),
                Some(CqlValue::Timestamp(CqlTimestamp(1_700_000_000_123))),
            ],
        }
    }

    #[test]
    fn decodes_tweet_rows() {
        let tweet = tweet_from_row(&tweet_row(Some(CqlValue::Text("hello!".into()))))
            .expect("tweet row");
        assert_eq!(tweet.text, "hello!");
        assert_eq!(tweet.image, "hoge.png");
        assert_eq!(tweet.created_at.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn null_text_decodes_as_empty() {
        let tweet = tweet_from_row(&tweet_row(None)).expect("tweet row");
        assert_eq!(tweet.text, "");
    }

    #[test]
    fn rejects_mistyped_columns() {
        let err = tweet_from_row(&tweet_row(Some(CqlValue::Int(7)))).unwrap_err();
        assert!(matches!(err, StoreError::Row { table: "tweets", .. }));
    }

    fn statement_texts(batch: &Batch) -> Vec<&str> {
        batch
            .statements
            .iter()
            .filter_map(|statement| match statement {
                BatchStatement::Query(query) => Some(query.contents.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn insert_writes_tweet_and_timeline_in_one_logged_batch() {
        let batch = insert_tweet_batch();
        assert!(matches!(batch.get_type(), BatchType::Logged));
        let texts = statement_texts(&batch);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].starts_with("INSERT INTO tweets "));
        assert!(texts[1].starts_with("INSERT INTO tweet_timeline "));
    }

    #[test]
    fn delete_removes_timeline_comments_and_tweet_in_one_logged_batch() {
        let batch = delete_tweet_batch();
        assert!(matches!(batch.get_type(), BatchType::Logged));
        let texts = statement_texts(&batch);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("DELETE FROM tweet_timeline "));
        assert!(texts[1].starts_with("DELETE FROM comments_by_tweet "));
        assert!(texts[2].starts_with("DELETE FROM tweets "));
    }

    #[test]
    fn update_only_applies_to_existing_tweets() {
        assert!(UPDATE_TWEET.ends_with("IF EXISTS"));
    }

    #[test]
    fn reads_the_applied_flag() {
        let row = |applied| Row {
            columns: vec![Some(CqlValue::Boolean(applied))],
        };
        assert!(was_applied(&[row(true)]).expect("applied"));
        assert!(!was_applied(&[row(false)]).expect("not applied"));
        assert!(was_applied(&[]).is_err());
    }

    #[test]
    fn timestamps_round_trip_through_cql() {
        let at = DateTime::<Utc>::from_timestamp(-1, 500_000_000).expect("timestamp");
        assert_eq!(from_cql_timestamp(to_cql_timestamp(at)), Some(at));
    }
}
