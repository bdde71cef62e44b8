use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ErrorUnauthorized;
use actix_web::http::header;
use actix_web::{web, Error, FromRequest, HttpRequest, HttpResponse};
use futures_util::future::{ok, ready, Ready};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use uuid::Uuid;

/// Cookie marking a visitor who has entered the site passcode. Long-lived;
/// there is no logout for this gate, only expiry.
pub const SITE_COOKIE: &str = "amoria_auth";
pub const SITE_COOKIE_VALUE: &str = "true";
pub const SITE_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Cookie carrying the admin session token. Set without an expiry so the
/// browser drops it when the session ends.
pub const ADMIN_COOKIE: &str = "amoria_admin";

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Route prefixes behind the site passcode. Everything else (home, gallery,
/// quiz, bucket list, capsule, admin, the API) passes unchecked.
pub const PROTECTED_PREFIXES: &[&str] = &["/timeline", "/map", "/vault"];

/// Whether `path` falls under a protected prefix. Matches the prefix itself
/// and its subpaths, not unrelated paths that merely share the leading text.
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn has_site_cookie(req: &ServiceRequest) -> bool {
    req.cookie(SITE_COOKIE)
        .map(|c| c.value() == SITE_COOKIE_VALUE)
        .unwrap_or(false)
}

/// Request-interception gate for the site passcode. Runs before routing:
/// a protected path without the credential cookie is redirected to the login
/// page, and the login page itself redirects home once the cookie is set.
pub struct SiteGate;

impl<S, B> Transform<S, ServiceRequest> for SiteGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SiteGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SiteGateMiddleware { service })
    }
}

pub struct SiteGateMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SiteGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let authed = has_site_cookie(&req);
        let path = req.path();

        let target = if is_protected(path) && !authed {
            Some(LOGIN_PATH)
        } else if path == LOGIN_PATH && authed {
            Some(HOME_PATH)
        } else {
            None
        };

        if let Some(target) = target {
            let (req, _) = req.into_parts();
            let redirect = HttpResponse::Found()
                .insert_header((header::LOCATION, target))
                .finish();
            let res = ServiceResponse::new(req, redirect).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
    }
}

/// Admin login state. Tokens live only in process memory, which is what
/// scopes them to the server session; revoking one on logout and issuing one
/// on login both notify every registered listener before the call returns.
pub struct AdminSessions {
    tokens: Mutex<HashSet<String>>,
    listeners: Mutex<Vec<Box<dyn Fn(bool) + Send + Sync>>>,
}

impl AdminSessions {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashSet::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Plaintext comparison against the stored admin password, as the site
    /// has always done it. Returns a fresh session token on a match.
    pub fn login(&self, submitted: &str, expected: &str) -> Option<String> {
        if submitted != expected {
            return None;
        }
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.lock().unwrap().insert(token.clone());
        self.notify(true);
        Some(token)
    }

    pub fn logout(&self, token: &str) -> bool {
        let removed = self.tokens.lock().unwrap().remove(token);
        if removed {
            self.notify(false);
        }
        removed
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens.lock().unwrap().contains(token)
    }

    /// Register a listener for login/logout transitions. Listeners run
    /// synchronously inside the transition.
    pub fn subscribe(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    fn notify(&self, logged_in: bool) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(logged_in);
        }
    }
}

impl Default for AdminSessions {
    fn default() -> Self {
        Self::new()
    }
}

/// The admin marker as sent by a client: session cookie or bearer token.
pub fn admin_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ADMIN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Extractor guarding the admin content API. Rejects with 401 unless the
/// request carries a token the session registry recognizes.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub token: String,
}

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let sessions = req.app_data::<web::Data<AdminSessions>>();
        let token = admin_token(req);
        match (sessions, token) {
            (Some(sessions), Some(token)) if sessions.is_valid(&token) => {
                ready(Ok(AdminUser { token }))
            }
            _ => ready(Err(ErrorUnauthorized("Admin login required"))),
        }
    }
}
