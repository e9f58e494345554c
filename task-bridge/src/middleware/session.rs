use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::models::SessionId;

pub const SESSION_COOKIE: &str = "sessionID";

/// Session id presented by the caller, if any. Whether it names a live
/// session is decided by the service that consumes it.
#[derive(Clone, Debug, Default)]
pub struct CurrentSession(pub Option<SessionId>);

impl CurrentSession {
    pub fn id(&self) -> Option<&SessionId> {
        self.0.as_ref()
    }
}

pub async fn session_middleware(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .map(SessionId::new);

    request.extensions_mut().insert(CurrentSession(session_id));
    next.run(request).await
}

pub fn session_cookie(id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.as_str().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&SessionId::new("abc123"), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
    }
}
