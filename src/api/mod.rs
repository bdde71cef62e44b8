use actix_multipart::Multipart;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{
    admin_token, AdminSessions, AdminUser, ADMIN_COOKIE, SITE_COOKIE, SITE_COOKIE_MAX_AGE_DAYS,
    SITE_COOKIE_VALUE,
};
use crate::hydration::HydrationGate;
use crate::models::*;
use crate::store::Store;
use crate::upload::{size_limit, MediaStore, UploadError};

pub struct AppState {
    pub store: Arc<Store>,
    pub admin: Arc<AdminSessions>,
    pub media: Arc<MediaStore>,
    pub hydration: Arc<HydrationGate>,
}

/// Content endpoints answer 503 until the store's initial load has finished,
/// so clients see a loading state instead of stale defaults.
fn still_loading(state: &AppState) -> Option<HttpResponse> {
    if state.hydration.is_hydrated() {
        None
    } else {
        Some(
            HttpResponse::ServiceUnavailable()
                .json(ApiResponse::<()>::error("Content is still loading")),
        )
    }
}

// ==================== Health Check ====================

pub async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "hydrated": state.hydration.is_hydrated(),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Public pages ====================

pub async fn home(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    let settings = state.store.settings();
    HttpResponse::Ok().json(ApiResponse::success(json!({
        "coupleName": settings.couple_name,
        "relationshipStartDate": settings.relationship_start_date,
        "showTimer": settings.show_timer,
    })))
}

pub async fn login_page() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(json!({
        "message": "Enter the passcode to continue"
    })))
}

pub async fn timeline_page(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    // Date order, not insertion order.
    let mut events = state.store.timeline();
    events.sort_by(|a, b| a.date.cmp(&b.date));
    HttpResponse::Ok().json(ApiResponse::success(events))
}

#[derive(Deserialize)]
pub struct GalleryQuery {
    category: Option<String>,
}

pub async fn gallery_page(
    state: web::Data<AppState>,
    query: web::Query<GalleryQuery>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    let mut images = state.store.gallery();
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        images.retain(|i| i.category == category);
    }
    HttpResponse::Ok().json(ApiResponse::success(images))
}

pub async fn map_page(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(state.store.locations()))
}

pub async fn bucket_list_page(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(state.store.bucket_list()))
}

pub async fn quiz_page(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(state.store.quiz()))
}

pub async fn vault_page(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(state.store.vault()))
}

/// The capsule withholds its message until the unlock instant has passed.
pub async fn capsule_page(state: web::Data<AppState>) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    let capsule = state.store.capsule();
    if capsule.is_unlocked(Utc::now()) {
        HttpResponse::Ok().json(ApiResponse::success(json!({
            "unlocked": true,
            "capsule": capsule,
        })))
    } else {
        HttpResponse::Ok().json(ApiResponse::success(json!({
            "unlocked": false,
            "unlockDate": capsule.unlock_date,
        })))
    }
}

// ==================== Site passcode ====================

pub async fn passcode_login(
    state: web::Data<AppState>,
    body: web::Json<PasscodeLoginRequest>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    if body.passcode != state.store.settings().passcode {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Incorrect passcode"));
    }
    let cookie = Cookie::build(SITE_COOKIE, SITE_COOKIE_VALUE)
        .path("/")
        .max_age(CookieDuration::days(SITE_COOKIE_MAX_AGE_DAYS))
        .finish();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(ApiResponse::success(json!({ "authenticated": true })))
}

pub async fn site_session(req: HttpRequest) -> impl Responder {
    let authenticated = req
        .cookie(SITE_COOKIE)
        .map(|c| c.value() == SITE_COOKIE_VALUE)
        .unwrap_or(false);
    HttpResponse::Ok().json(ApiResponse::success(json!({ "authenticated": authenticated })))
}

// ==================== Admin session ====================

pub async fn admin_login(
    state: web::Data<AppState>,
    body: web::Json<AdminLoginRequest>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    let expected = state.store.settings().admin_password;
    match state.admin.login(&body.password, &expected) {
        Some(token) => {
            // Session cookie: no expiry, gone when the browser session ends.
            let cookie = Cookie::build(ADMIN_COOKIE, token.clone()).path("/").finish();
            HttpResponse::Ok()
                .cookie(cookie)
                .json(ApiResponse::success(json!({ "token": token })))
        }
        None => HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Incorrect password")),
    }
}

pub async fn admin_logout(state: web::Data<AppState>, admin: AdminUser) -> impl Responder {
    state.admin.logout(&admin.token);
    let cleared = Cookie::build(ADMIN_COOKIE, "")
        .path("/")
        .max_age(CookieDuration::ZERO)
        .finish();
    HttpResponse::Ok()
        .cookie(cleared)
        .json(ApiResponse::success(json!({ "loggedIn": false })))
}

pub async fn admin_session(sessions: web::Data<AdminSessions>, req: HttpRequest) -> impl Responder {
    let logged_in = admin_token(&req)
        .map(|t| sessions.is_valid(&t))
        .unwrap_or(false);
    HttpResponse::Ok().json(ApiResponse::success(json!({ "loggedIn": logged_in })))
}

// ==================== Admin content API ====================

pub async fn get_content(state: web::Data<AppState>, _admin: AdminUser) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(state.store.snapshot()))
}

pub async fn update_settings(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<SiteSettingsPatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(
        state.store.update_settings(body.into_inner()),
    ))
}

pub async fn update_vault(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<VaultSecretPatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(
        state.store.update_vault(body.into_inner()),
    ))
}

pub async fn update_capsule(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<TimeCapsulePatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    HttpResponse::Ok().json(ApiResponse::success(
        state.store.update_capsule(body.into_inner()),
    ))
}

// ==================== Timeline ====================

pub async fn create_timeline_event(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<NewTimelineEvent>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
    }
    let id = state.store.add_timeline_event(body.into_inner());
    HttpResponse::Created().json(ApiResponse::success(json!({ "id": id })))
}

pub async fn update_timeline_event(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<TimelineEventPatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    match state
        .store
        .update_timeline_event(&path.into_inner(), body.into_inner())
    {
        Some(event) => HttpResponse::Ok().json(ApiResponse::success(event)),
        None => HttpResponse::NotFound().json(ApiResponse::<()>::error("Timeline event not found")),
    }
}

pub async fn delete_timeline_event(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> impl Responder {
    state.store.delete_timeline_event(&path.into_inner());
    HttpResponse::NoContent().finish()
}

// ==================== Gallery ====================

pub async fn create_gallery_image(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<NewGalleryImage>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
    }
    let id = state.store.add_gallery_image(body.into_inner());
    HttpResponse::Created().json(ApiResponse::success(json!({ "id": id })))
}

pub async fn update_gallery_image(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<GalleryImagePatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    match state
        .store
        .update_gallery_image(&path.into_inner(), body.into_inner())
    {
        Some(image) => HttpResponse::Ok().json(ApiResponse::success(image)),
        None => HttpResponse::NotFound().json(ApiResponse::<()>::error("Gallery image not found")),
    }
}

pub async fn delete_gallery_image(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> impl Responder {
    state.store.delete_gallery_image(&path.into_inner());
    HttpResponse::NoContent().finish()
}

// ==================== Locations ====================

pub async fn create_location(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<NewMapLocation>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
    }
    let id = state.store.add_location(body.into_inner());
    HttpResponse::Created().json(ApiResponse::success(json!({ "id": id })))
}

pub async fn update_location(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<MapLocationPatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    match state
        .store
        .update_location(&path.into_inner(), body.into_inner())
    {
        Some(location) => HttpResponse::Ok().json(ApiResponse::success(location)),
        None => HttpResponse::NotFound().json(ApiResponse::<()>::error("Location not found")),
    }
}

pub async fn delete_location(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> impl Responder {
    state.store.delete_location(&path.into_inner());
    HttpResponse::NoContent().finish()
}

// ==================== Bucket list ====================

pub async fn create_bucket_list_item(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<NewBucketListItem>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
    }
    let id = state.store.add_bucket_list_item(body.into_inner());
    HttpResponse::Created().json(ApiResponse::success(json!({ "id": id })))
}

pub async fn update_bucket_list_item(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<BucketListItemPatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    match state
        .store
        .update_bucket_list_item(&path.into_inner(), body.into_inner())
    {
        Some(item) => HttpResponse::Ok().json(ApiResponse::success(item)),
        None => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Bucket list item not found"))
        }
    }
}

pub async fn delete_bucket_list_item(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> impl Responder {
    state.store.delete_bucket_list_item(&path.into_inner());
    HttpResponse::NoContent().finish()
}

// ==================== Quiz ====================

pub async fn create_quiz_question(
    state: web::Data<AppState>,
    _admin: AdminUser,
    body: web::Json<NewQuizQuestion>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
    }
    let id = state.store.add_quiz_question(body.into_inner());
    HttpResponse::Created().json(ApiResponse::success(json!({ "id": id })))
}

pub async fn update_quiz_question(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<QuizQuestionPatch>,
) -> impl Responder {
    if let Some(resp) = still_loading(&state) {
        return resp;
    }
    let id = path.into_inner();

    // The invariant is checked against the merged record before anything is
    // written; the store itself stays validation-free.
    let Some(current) = state.store.quiz().into_iter().find(|q| q.id == id) else {
        return HttpResponse::NotFound().json(ApiResponse::<()>::error("Quiz question not found"));
    };
    let merged = body.merged(&current);
    if let Err(e) = check_quiz_invariants(&merged.question, &merged.options, &merged.answer) {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string()));
    }

    match state.store.update_quiz_question(&id, body.into_inner()) {
        Some(question) => HttpResponse::Ok().json(ApiResponse::success(question)),
        None => HttpResponse::NotFound().json(ApiResponse::<()>::error("Quiz question not found")),
    }
}

pub async fn delete_quiz_question(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<String>,
) -> impl Responder {
    state.store.delete_quiz_question(&path.into_inner());
    HttpResponse::NoContent().finish()
}

// ==================== Uploads ====================

/// Accepts one multipart `file` field, validates type and size, and stores
/// it. The response shape (`{url, filename}` on success, `{error}` on
/// failure) is the upload collaborator's contract, distinct from the
/// `ApiResponse` envelope used elsewhere.
pub async fn upload_media(state: web::Data<AppState>, mut payload: Multipart) -> HttpResponse {
    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return HttpResponse::BadRequest()
                    .json(json!({ "error": format!("Malformed upload: {}", e) }))
            }
        };

        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_string();
        if name != "file" {
            continue;
        }
        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();
        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        // Reject before reading any bytes when the type alone is enough.
        let limit = match size_limit(&content_type) {
            Some(limit) => limit,
            None => {
                let e = UploadError::UnsupportedType(content_type);
                return HttpResponse::BadRequest().json(json!({ "error": e.to_string() }));
            }
        };

        let mut data = Vec::new();
        loop {
            match field.try_next().await {
                Ok(Some(chunk)) => {
                    if data.len() + chunk.len() > limit {
                        let e = UploadError::TooLarge(limit / (1024 * 1024));
                        return HttpResponse::BadRequest().json(json!({ "error": e.to_string() }));
                    }
                    data.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    return HttpResponse::BadRequest()
                        .json(json!({ "error": format!("Malformed upload: {}", e) }))
                }
            }
        }

        return match state.media.save(&filename, &content_type, &data) {
            Ok(stored) => HttpResponse::Ok().json(stored),
            Err(UploadError::Io(e)) => {
                log::error!("upload failed: {}", e);
                HttpResponse::InternalServerError()
                    .json(json!({ "error": "Upload failed. Please try again." }))
            }
            Err(e) => HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
        };
    }

    HttpResponse::BadRequest().json(json!({ "error": "No file provided" }))
}

#[derive(Deserialize)]
pub struct DeleteMediaQuery {
    url: Option<String>,
}

/// Remote cleanup is best-effort: the caller's own state change never waits
/// on it, so a missing file still answers success.
pub async fn delete_media(
    state: web::Data<AppState>,
    query: web::Query<DeleteMediaQuery>,
) -> impl Responder {
    let url = match query.url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => url,
        None => return HttpResponse::BadRequest().json(json!({ "error": "No URL provided" })),
    };
    if !state.media.delete_by_url(url) {
        log::warn!("media delete was a no-op for {}", url);
    }
    HttpResponse::Ok().json(json!({ "success": true }))
}

pub async fn serve_media(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.media.read(&path.into_inner()) {
        Some((bytes, content_type)) => HttpResponse::Ok().content_type(content_type).body(bytes),
        None => HttpResponse::NotFound().finish(),
    }
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))
        // Public pages (the site gate runs before these)
        .route("/", web::get().to(home))
        .route("/login", web::get().to(login_page))
        .route("/timeline", web::get().to(timeline_page))
        .route("/gallery", web::get().to(gallery_page))
        .route("/map", web::get().to(map_page))
        .route("/bucket-list", web::get().to(bucket_list_page))
        .route("/quiz", web::get().to(quiz_page))
        .route("/vault", web::get().to(vault_page))
        .route("/capsule", web::get().to(capsule_page))
        // Site passcode
        .route("/api/auth/login", web::post().to(passcode_login))
        .route("/api/auth/session", web::get().to(site_session))
        // Admin session
        .route("/api/admin/login", web::post().to(admin_login))
        .route("/api/admin/logout", web::post().to(admin_logout))
        .route("/api/admin/session", web::get().to(admin_session))
        // Admin content API
        .route("/api/admin/content", web::get().to(get_content))
        .route("/api/admin/settings", web::put().to(update_settings))
        .route("/api/admin/vault", web::put().to(update_vault))
        .route("/api/admin/capsule", web::put().to(update_capsule))
        .route("/api/admin/timeline", web::post().to(create_timeline_event))
        .route("/api/admin/timeline/{id}", web::put().to(update_timeline_event))
        .route("/api/admin/timeline/{id}", web::delete().to(delete_timeline_event))
        .route("/api/admin/gallery", web::post().to(create_gallery_image))
        .route("/api/admin/gallery/{id}", web::put().to(update_gallery_image))
        .route("/api/admin/gallery/{id}", web::delete().to(delete_gallery_image))
        .route("/api/admin/locations", web::post().to(create_location))
        .route("/api/admin/locations/{id}", web::put().to(update_location))
        .route("/api/admin/locations/{id}", web::delete().to(delete_location))
        .route("/api/admin/bucket-list", web::post().to(create_bucket_list_item))
        .route("/api/admin/bucket-list/{id}", web::put().to(update_bucket_list_item))
        .route("/api/admin/bucket-list/{id}", web::delete().to(delete_bucket_list_item))
        .route("/api/admin/quiz", web::post().to(create_quiz_question))
        .route("/api/admin/quiz/{id}", web::put().to(update_quiz_question))
        .route("/api/admin/quiz/{id}", web::delete().to(delete_quiz_question))
        // Uploads
        .route("/api/upload", web::post().to(upload_media))
        .route("/api/upload", web::delete().to(delete_media))
        .route("/media/{filename}", web::get().to(serve_media));
}
