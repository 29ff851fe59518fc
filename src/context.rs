//! Per-request identity.
//!
//! Authentication happens upstream. The gateway forwards the signed-in
//! user's id in [`USER_ID_HEADER`]; this extractor resolves it against the
//! store so handlers receive an explicit [`RequestContext`].

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use log::{debug, warn};
use uuid::Uuid;

use crate::error::{FeedError, FeedResult};
use crate::models::User;
use crate::store::SharedStore;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub current_user: Option<User>,
}

impl RequestContext {
    /// The signed-in user, or [`FeedError::Unauthenticated`] which answers
    /// with a redirect to the feed.
    pub fn require_user(&self) -> FeedResult<&User> {
        self.current_user.as_ref().ok_or(FeedError::Unauthenticated)
    }
}

fn forwarded_user_id(req: &HttpRequest) -> Option<Uuid> {
    let raw = req.headers().get(USER_ID_HEADER)?.to_str().ok()?;
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Ignoring malformed {} header: {}", USER_ID_HEADER, e);
            None
        }
    }
}

impl FromRequest for RequestContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let store = req.app_data::<web::Data<SharedStore>>().cloned();
        let user_id = forwarded_user_id(req);
        Box::pin(async move {
            let (Some(store), Some(user_id)) = (store, user_id) else {
                return Ok(Self::default());
            };
            let current_user = store.find_user(user_id).await.map_err(FeedError::from)?;
            if current_user.is_none() {
                debug!("No user {} in store; treating request as signed out", user_id);
            }
            Ok(Self { current_user })
        })
    }
}
