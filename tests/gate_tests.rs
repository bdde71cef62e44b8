use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use amoria::api::{self, AppState};
use amoria::auth::{AdminSessions, SiteGate};
use amoria::hydration::HydrationGate;
use amoria::models::SiteSettingsPatch;
use amoria::store::Store;
use amoria::upload::MediaStore;

struct TestContext {
    store: Arc<Store>,
    admin: Arc<AdminSessions>,
    media: Arc<MediaStore>,
    hydration: Arc<HydrationGate>,
    _media_dir: tempfile::TempDir,
}

fn test_context() -> TestContext {
    let media_dir = tempfile::tempdir().unwrap();
    let ctx = TestContext {
        store: Arc::new(Store::in_memory().unwrap()),
        admin: Arc::new(AdminSessions::new()),
        media: Arc::new(MediaStore::new(media_dir.path().to_path_buf())),
        hydration: Arc::new(HydrationGate::new()),
        _media_dir: media_dir,
    };
    ctx.hydration.mark_hydrated();
    ctx
}

fn app_state(ctx: &TestContext) -> AppState {
    AppState {
        store: ctx.store.clone(),
        admin: ctx.admin.clone(),
        media: ctx.media.clone(),
        hydration: ctx.hydration.clone(),
    }
}

macro_rules! init_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .wrap(SiteGate)
                .app_data(web::Data::from($ctx.admin.clone()))
                .app_data(web::Data::new(app_state(&$ctx)))
                .configure(api::configure_routes),
        )
        .await
    };
}

fn site_cookie() -> Cookie<'static> {
    Cookie::new("amoria_auth", "true")
}

#[actix_web::test]
async fn protected_paths_redirect_to_login_without_the_cookie() {
    let ctx = test_context();
    let app = init_app!(ctx);

    for path in ["/timeline", "/map", "/vault", "/timeline/2022", "/vault/x"] {
        let req = test::TestRequest::get().uri(path).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "path {}", path);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap().to_str().unwrap(),
            "/login",
            "path {}",
            path
        );
    }
}

#[actix_web::test]
async fn unprotected_paths_are_never_redirected() {
    let ctx = test_context();
    let app = init_app!(ctx);

    for path in ["/", "/gallery", "/quiz", "/bucket-list", "/capsule", "/health"] {
        let req = test::TestRequest::get().uri(path).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "path {}", path);
    }

    // Paths that merely share leading text with a protected prefix fall
    // through to routing (404), they are not gated.
    let req = test::TestRequest::get().uri("/timelines").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn the_cookie_opens_protected_paths() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/vault")
        .cookie(site_cookie())
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["hiddenMessage"], "Pack your bags!");
}

#[actix_web::test]
async fn login_page_redirects_home_when_already_authenticated() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let req = test::TestRequest::get().uri("/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/login")
        .cookie(site_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap().to_str().unwrap(),
        "/"
    );
}

#[actix_web::test]
async fn passcode_login_sets_the_long_lived_cookie() {
    let ctx = test_context();
    let app = init_app!(ctx);

    // Wrong passcode: no cookie, transient error.
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "passcode": "guess" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // The seeded passcode works and the marker is long-lived.
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "passcode": "forever2025" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("amoria_auth=true"));
    assert!(set_cookie.contains("Max-Age"));
}

#[actix_web::test]
async fn rotating_the_passcode_applies_to_the_next_login() {
    let ctx = test_context();
    let app = init_app!(ctx);

    ctx.store.update_settings(SiteSettingsPatch {
        passcode: Some("secret".to_string()),
        ..Default::default()
    });

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "passcode": "forever2025" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "passcode": "secret" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn content_answers_503_until_hydration_completes() {
    let media_dir = tempfile::tempdir().unwrap();
    let ctx = TestContext {
        store: Arc::new(Store::in_memory().unwrap()),
        admin: Arc::new(AdminSessions::new()),
        media: Arc::new(MediaStore::new(media_dir.path().to_path_buf())),
        hydration: Arc::new(HydrationGate::new()),
        _media_dir: media_dir,
    };
    let app = init_app!(ctx);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    ctx.hydration.mark_hydrated();

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
