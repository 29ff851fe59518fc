//! One-shot messages carried across a redirect.
//!
//! The cookie only holds an ASCII key; the localized text is looked up when
//! the message is rendered.

use actix_web::cookie::Cookie;
use actix_web::HttpRequest;
use serde::Serialize;

pub const FLASH_COOKIE: &str = "flash";

/// Rendered with the re-shown creation form; never carried to another request.
pub const CREATE_FAILED_ALERT: &str = "メッセージ送信失敗";

/// Messages that outlive the response that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    TweetCreated,
    EditForbidden,
}

impl Flash {
    fn key(self) -> &'static str {
        match self {
            Self::TweetCreated => "tweet_created",
            Self::EditForbidden => "edit_forbidden",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "tweet_created" => Some(Self::TweetCreated),
            "edit_forbidden" => Some(Self::EditForbidden),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::TweetCreated => "メッセージ送信成功",
            Self::EditForbidden => "他のユーザーの投稿の編集はできません",
        }
    }

    pub fn is_alert(self) -> bool {
        !matches!(self, Self::TweetCreated)
    }

    /// Cookie that hands this message to the next request.
    pub fn cookie(self) -> Cookie<'static> {
        Cookie::build(FLASH_COOKIE, self.key())
            .path("/")
            .http_only(true)
            .finish()
    }

    /// Reads the pending message, if any. Pair with [`removal_cookie`].
    pub fn pending(req: &HttpRequest) -> Option<Self> {
        req.cookie(FLASH_COOKIE)
            .and_then(|cookie| Self::from_key(cookie.value()))
    }
}

/// Expires the flash cookie once its message has been shown.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Flash slots as handed to the presentation layer.
#[derive(Debug, Default, Serialize)]
pub struct FlashMessages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<&'static str>,
}

impl From<Option<Flash>> for FlashMessages {
    fn from(flash: Option<Flash>) -> Self {
        match flash {
            Some(flash) if flash.is_alert() => Self {
                notice: None,
                alert: Some(flash.message()),
            },
            Some(flash) => Self {
                notice: Some(flash.message()),
                alert: None,
            },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn every_carried_message_survives_the_cookie() {
        for flash in [Flash::TweetCreated, Flash::EditForbidden] {
            let req = TestRequest::default()
                .cookie(flash.cookie())
                .to_http_request();
            assert_eq!(Flash::pending(&req), Some(flash));
        }
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, "bogus"))
            .to_http_request();
        assert_eq!(Flash::pending(&req), None);
    }

    #[test]
    fn alerts_and_notices_land_in_their_slots() {
        let alert = FlashMessages::from(Some(Flash::EditForbidden));
        assert_eq!(alert.alert, Some("他のユーザーの投稿の編集はできません"));
        assert_eq!(alert.notice, None);

        let notice = FlashMessages::from(Some(Flash::TweetCreated));
        assert_eq!(notice.notice, Some("メッセージ送信成功"));
        assert_eq!(notice.alert, None);
    }
}
