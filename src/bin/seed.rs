use bcrypt::{hash, DEFAULT_COST};
use chrono::{Duration, Utc};
use clap::Parser;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use log::info;
use std::error::Error;
use uuid::Uuid;

use tweet_feed::config::{init_logging, ScyllaSettings};
use tweet_feed::db::{create_session, ScyllaStore};
use tweet_feed::models::{Comment, Tweet, User};
use tweet_feed::store::TweetStore;

const COMMENTS_PER_TWEET: usize = 3;

/// Fills a ScyllaDB keyspace with fake users, tweets and comments
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(flatten)]
    scylla: ScyllaSettings,

    /// Number of users to create
    #[clap(long, default_value_t = 100)]
    users: usize,

    /// Number of tweets per user
    #[clap(long, default_value_t = 20)]
    tweets_per_user: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging(log::LevelFilter::Info);
    let args = Args::parse();
    info!("Starting data seeding...");

    let session = create_session(&args.scylla.nodes, &args.scylla.keyspace).await?;
    let store = ScyllaStore::new(session);

    let users = seed_users(&store, args.users).await?;
    seed_tweets(&store, &users, args.tweets_per_user).await?;

    info!("Seeding completed!");
    Ok(())
}

async fn seed_users(store: &ScyllaStore, count: usize) -> Result<Vec<User>, Box<dyn Error>> {
    info!("Creating {} users...", count);
    let mut users = Vec::with_capacity(count);

    for i in 0..count {
        let now = Utc::now();
        let user = User {
            user_id: Uuid::new_v4(),
            username: Username().fake(),
            email: SafeEmail().fake(),
            password_hash: hash("password123", DEFAULT_COST)?,
            created_at: now,
            updated_at: now,
        };
        store.insert_user(&user).await?;
        info!(
            "Created user {}/{}: {} ({})",
            i + 1,
            count,
            user.username,
            user.user_id
        );
        users.push(user);
    }

    Ok(users)
}

async fn seed_tweets(
    store: &ScyllaStore,
    users: &[User],
    tweets_per_user: usize,
) -> Result<(), Box<dyn Error>> {
    info!("Creating {} tweets per user...", tweets_per_user);
    let total_tweets = users.len() * tweets_per_user;
    let mut current_tweet = 0;

    for user in users {
        for _ in 0..tweets_per_user {
            let image: String = Word().fake();
            let mut tweet = Tweet::new(user, Sentence(3..10).fake(), format!("{image}.png"));
            // Spread tweets over the last two days.
            tweet.created_at -= Duration::seconds((0..172_800_i64).fake::<i64>());
            tweet.updated_at = tweet.created_at;
            store.insert_tweet(&tweet).await?;

            for n in 0..COMMENTS_PER_TWEET {
                let author = &users[(0..users.len()).fake::<usize>()];
                let comment = Comment {
                    comment_id: Uuid::new_v4(),
                    tweet_id: tweet.tweet_id,
                    user_id: author.user_id,
                    text: Sentence(2..6).fake(),
                    created_at: tweet.created_at + Duration::minutes(n as i64 + 1),
                };
                store.insert_comment(&comment).await?;
            }

            current_tweet += 1;
            if current_tweet % 100 == 0 {
                info!("Created {}/{} tweets", current_tweet, total_tweets);
            }
        }
    }

    Ok(())
}
