//! Tweet resource handlers.
//!
//! ```text
//! GET    /tweets            feed (no sign-in needed)
//! GET    /tweets/new        creation form
//! POST   /tweets            create
//! GET    /tweets/{id}       tweet with comments
//! GET    /tweets/{id}/edit  edit form
//! PATCH  /tweets/{id}       update (owner only)
//! DELETE /tweets/{id}       delete (owner only)
//! ```
//!
//! Responses are JSON view models. `view` names the template the
//! presentation layer renders.

use actix_web::http::header;
use actix_web::{delete, get, post, route, web, Either, HttpRequest, HttpResponse};
use log::{error, info};
use serde_json::json;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{FeedError, FeedResult};
use crate::flash::{self, Flash, FlashMessages};
use crate::models::{PageQuery, Tweet, TweetParams};
use crate::store::SharedStore;

pub const INDEX_PATH: &str = "/tweets";

/// Submitted tweet fields, as JSON or as an urlencoded form. A missing or
/// unreadable body counts as no fields at all.
type SubmittedParams = Option<Either<web::Json<TweetParams>, web::Form<TweetParams>>>;

fn into_params(submitted: SubmittedParams) -> TweetParams {
    match submitted {
        Some(Either::Left(json)) => json.into_inner(),
        Some(Either::Right(form)) => form.into_inner(),
        None => TweetParams::default(),
    }
}

async fn find_tweet(store: &SharedStore, raw_id: &str) -> FeedResult<Tweet> {
    let tweet_id = Uuid::parse_str(raw_id).map_err(|_| FeedError::NotFound)?;
    store.find_tweet(tweet_id).await?.ok_or(FeedError::NotFound)
}

/// Reads `page` from the query string. Undecodable strings and repeated keys
/// never fail the request; the last `page` value wins.
fn page_query(req: &HttpRequest) -> PageQuery {
    let page = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .ok()
        .and_then(|pairs| {
            pairs
                .into_inner()
                .into_iter()
                .filter(|(key, _)| key == "page")
                .map(|(_, value)| value)
                .last()
        });
    PageQuery { page }
}

/// Registers the tweet routes. `/tweets/new` has to come before
/// `/tweets/{tweet_id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(new_tweet)
        .service(create)
        .service(show)
        .service(edit)
        .service(update)
        .service(destroy);
}

#[get("/tweets")]
pub async fn index(
    req: HttpRequest,
    store: web::Data<SharedStore>,
) -> FeedResult<HttpResponse> {
    let pending = Flash::pending(&req);
    let page = store.page(page_query(&req).page()).await?;

    let mut response = HttpResponse::Ok();
    if pending.is_some() {
        response.cookie(flash::removal_cookie());
    }
    let messages = FlashMessages::from(pending);
    Ok(response.json(json!({
        "view": "index",
        "tweets": page.tweets,
        "page": page.page,
        "total_pages": page.total_pages,
        "notice": messages.notice,
        "alert": messages.alert,
    })))
}

#[get("/tweets/new")]
pub async fn new_tweet(ctx: RequestContext) -> FeedResult<HttpResponse> {
    ctx.require_user()?;
    let blank = TweetParams {
        text: Some(String::new()),
        image: Some(String::new()),
    };
    Ok(HttpResponse::Ok().json(json!({
        "view": "new",
        "tweet": blank,
    })))
}

#[post("/tweets")]
pub async fn create(
    ctx: RequestContext,
    store: web::Data<SharedStore>,
    submitted: SubmittedParams,
) -> FeedResult<HttpResponse> {
    let user = ctx.require_user()?;
    let params = into_params(submitted);
    let tweet = Tweet::new(
        user,
        params.text.clone().unwrap_or_default(),
        params.image.clone().unwrap_or_default(),
    );

    if let Err(e) = tweet.validate() {
        info!("Rejected tweet from {}: {}", user.user_id, e);
        return Ok(HttpResponse::UnprocessableEntity().json(json!({
            "view": "new",
            "alert": flash::CREATE_FAILED_ALERT,
            "tweet": params,
        })));
    }

    if let Err(e) = store.insert_tweet(&tweet).await {
        error!("Failed to create tweet: {:?}", e);
        return Err(e.into());
    }
    info!("Tweet created successfully: {}", tweet.tweet_id);
    // The notice is shown now and once more on the next feed visit.
    Ok(HttpResponse::Ok().cookie(Flash::TweetCreated.cookie()).json(json!({
        "view": "create",
        "notice": Flash::TweetCreated.message(),
        "tweet": tweet,
    })))
}

#[get("/tweets/{tweet_id}")]
pub async fn show(
    ctx: RequestContext,
    store: web::Data<SharedStore>,
    tweet_id: web::Path<String>,
) -> FeedResult<HttpResponse> {
    ctx.require_user()?;
    let tweet = find_tweet(&store, &tweet_id).await?;
    let comments = store.comments_with_authors(tweet.tweet_id).await?;
    let tweet = store
        .with_authors(vec![tweet])
        .await?
        .into_iter()
        .next()
        .ok_or(FeedError::NotFound)?;

    Ok(HttpResponse::Ok().json(json!({
        "view": "show",
        "tweet": tweet,
        "comments": comments,
    })))
}

#[get("/tweets/{tweet_id}/edit")]
pub async fn edit(
    ctx: RequestContext,
    store: web::Data<SharedStore>,
    tweet_id: web::Path<String>,
) -> FeedResult<HttpResponse> {
    ctx.require_user()?;
    let tweet = find_tweet(&store, &tweet_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "view": "edit",
        "tweet": tweet,
    })))
}

#[route("/tweets/{tweet_id}", method = "PATCH", method = "PUT")]
pub async fn update(
    ctx: RequestContext,
    store: web::Data<SharedStore>,
    tweet_id: web::Path<String>,
    submitted: SubmittedParams,
) -> FeedResult<HttpResponse> {
    let user = ctx.require_user()?;
    let tweet = find_tweet(&store, &tweet_id).await?;

    if !tweet.is_owned_by(user) {
        info!(
            "User {} may not edit tweet {} owned by {}",
            user.user_id, tweet.tweet_id, tweet.user_id
        );
        return Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, INDEX_PATH))
            .cookie(Flash::EditForbidden.cookie())
            .finish());
    }

    let updated = into_params(submitted).apply_to(&tweet);
    let tweet = match updated.validate() {
        Ok(()) => {
            if !store.update_tweet(&updated).await? {
                return Err(FeedError::NotFound);
            }
            info!("Tweet updated: {}", updated.tweet_id);
            updated
        }
        Err(e) => {
            info!("Rejected update of tweet {}: {}", tweet.tweet_id, e);
            tweet
        }
    };

    Ok(HttpResponse::Ok().json(json!({
        "view": "update",
        "tweet": tweet,
    })))
}

#[delete("/tweets/{tweet_id}")]
pub async fn destroy(
    ctx: RequestContext,
    store: web::Data<SharedStore>,
    tweet_id: web::Path<String>,
) -> FeedResult<HttpResponse> {
    let user = ctx.require_user()?;
    let tweet = find_tweet(&store, &tweet_id).await?;

    if tweet.is_owned_by(user) {
        store.delete_tweet(&tweet).await?;
        info!("Tweet deleted: {}", tweet.tweet_id);
    } else {
        info!(
            "User {} may not delete tweet {} owned by {}",
            user.user_id, tweet.tweet_id, tweet.user_id
        );
    }

    Ok(HttpResponse::Ok().json(json!({ "view": "destroy" })))
}
