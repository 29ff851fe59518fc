use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of tweets on one page of the feed.
pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// The part of a user that is shown next to their tweets and comments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub user_id: Uuid,
    pub username: String,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub image: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Tweet {
    /// Builds a new tweet owned by `owner`, stamped with the current time.
    pub fn new(owner: &User, text: String, image: String) -> Self {
        let now = Utc::now();
        Self {
            tweet_id: Uuid::new_v4(),
            user_id: owner.user_id,
            text,
            image,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user_id == user.user_id
    }

    /// Checks the rules a tweet must satisfy before it is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::BlankText);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("text can't be blank")]
    BlankText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: Uuid,
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetWithAuthor {
    #[serde(flatten)]
    pub tweet: Tweet,
    pub user: Option<Author>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: Option<Author>,
}

/// One page of the recency-ordered feed.
#[derive(Debug, Clone, PartialEq)]
pub struct TweetPage {
    pub tweets: Vec<TweetWithAuthor>,
    pub page: usize,
    pub total_pages: usize,
}

/// Pages needed to show `count` tweets.
pub fn total_pages(count: usize) -> usize {
    count.div_ceil(PAGE_SIZE)
}

/// Offset of the first tweet on a one-based `page`.
pub fn page_offset(page: usize) -> usize {
    page.saturating_sub(1).saturating_mul(PAGE_SIZE)
}

/// Writable fields accepted by create and update. Any other submitted field
/// is dropped during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetParams {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl TweetParams {
    /// Overwrites the fields present in `self` on a copy of `tweet`.
    pub fn apply_to(&self, tweet: &Tweet) -> Tweet {
        let mut updated = tweet.clone();
        if let Some(text) = &self.text {
            updated.text = text.clone();
        }
        if let Some(image) = &self.image {
            updated.image = image.clone();
        }
        updated.updated_at = Utc::now();
        updated
    }
}

#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// One-based page number. Missing, unparseable or non-positive values
    /// fall back to the first page.
    pub fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn user() -> User {
        let now = Utc::now();
        User {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case(None, 1)]
    #[case(Some("3"), 3)]
    #[case(Some("0"), 1)]
    #[case(Some("-2"), 1)]
    #[case(Some("abc"), 1)]
    #[case(Some(" 2 "), 2)]
    fn page_query_defaults_to_first_page(#[case] raw: Option<&str>, #[case] expected: usize) {
        let query = PageQuery {
            page: raw.map(str::to_owned),
        };
        assert_eq!(query.page(), expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(5, 1)]
    #[case(6, 2)]
    #[case(11, 3)]
    fn total_pages_rounds_up(#[case] count: usize, #[case] expected: usize) {
        assert_eq!(total_pages(count), expected);
    }

    #[test]
    fn page_offset_is_zero_based() {
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(3), 10);
    }

    #[rstest]
    #[case("", false)]
    #[case("   ", false)]
    #[case("hello!", true)]
    fn text_must_not_be_blank(#[case] text: &str, #[case] valid: bool) {
        let tweet = Tweet::new(&user(), text.into(), String::new());
        assert_eq!(tweet.validate().is_ok(), valid);
    }

    #[test]
    fn apply_to_only_touches_submitted_fields() {
        let owner = user();
        let tweet = Tweet::new(&owner, "hello!".into(), "hoge.png".into());
        let params = TweetParams {
            text: Some("hoge".into()),
            image: None,
        };

        let updated = params.apply_to(&tweet);

        assert_eq!(updated.text, "hoge");
        assert_eq!(updated.image, "hoge.png");
        assert_eq!(updated.tweet_id, tweet.tweet_id);
        assert_eq!(updated.user_id, tweet.user_id);
        assert_eq!(updated.created_at, tweet.created_at);
    }

    #[test]
    fn params_ignore_unknown_fields() {
        let params: TweetParams = serde_json::from_str(
            r#"{"text":"aaa","image":"aaa.jpeg","user_id":"00000000-0000-0000-0000-000000000000"}"#,
        )
        .expect("params");
        assert_eq!(params.text.as_deref(), Some("aaa"));
        assert_eq!(params.image.as_deref(), Some("aaa.jpeg"));
    }

    #[test]
    fn serialized_user_hides_credentials() {
        let value = serde_json::to_value(user()).expect("user json");
        assert!(value.get("password_hash").is_none());
        assert!(value.get("email").is_none());
    }
}
