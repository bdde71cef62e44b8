use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Site-wide configuration. Drives the countdown display and both auth gates.
/// Fields absent from an older stored document take their first-run values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettings {
    pub couple_name: String,
    /// ISO datetime string; may be empty when no anniversary is set.
    pub relationship_start_date: String,
    pub passcode: String,
    pub admin_password: String,
    pub show_timer: bool,
}

/// A dated milestone shown on the timeline page. Ordered by date at read
/// time, not by insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    pub date: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A photo in the gallery. `category` is free text used for filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: String,
    pub src: String,
    pub alt: String,
    pub category: String,
}

/// A pin on the map page. The first image, when present, is the thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapLocation {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketListItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

/// A quiz entry. Invariant (enforced at the request layer, not the store):
/// 2-4 distinct options and the answer is one of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// The hidden message behind the vault page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSecret {
    pub hidden_message: String,
    pub sub_message: String,
    pub code: String,
}

/// A message sealed until `unlock_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeCapsule {
    pub unlock_date: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            couple_name: "Roshan & Alisha".to_string(),
            relationship_start_date: "2022-06-15T18:30:00".to_string(),
            passcode: "forever2025".to_string(),
            admin_password: "admin123".to_string(),
            show_timer: true,
        }
    }
}

impl Default for VaultSecret {
    fn default() -> Self {
        Self {
            hidden_message: "Pack your bags!".to_string(),
            sub_message: "We're going to Italy this summer!".to_string(),
            code: "AMORE-2025".to_string(),
        }
    }
}

impl Default for TimeCapsule {
    fn default() -> Self {
        Self {
            unlock_date: "2026-06-15T00:00:00".to_string(),
            message: "If you're reading this, we've made it another year. Remember that fight about the dishwasher? Funny now, right? I love you more than ever.".to_string(),
            image: None,
        }
    }
}

impl TimeCapsule {
    /// Whether the capsule content may be shown at `now`. An unparseable
    /// unlock date keeps the capsule sealed.
    pub fn is_unlocked(&self, now: DateTime<Utc>) -> bool {
        let unlock = DateTime::parse_from_rfc3339(&self.unlock_date)
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(&self.unlock_date, "%Y-%m-%dT%H:%M:%S")
            });
        match unlock {
            Ok(unlock) => now.naive_utc() >= unlock,
            Err(_) => false,
        }
    }
}

/// The whole persisted site content: every collection and singleton under a
/// single aggregate, serialized as one document. Fields absent from a stored
/// document fall back to the first-run defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDocument {
    pub settings: SiteSettings,
    pub timeline: Vec<TimelineEvent>,
    pub gallery: Vec<GalleryImage>,
    pub locations: Vec<MapLocation>,
    pub bucket_list: Vec<BucketListItem>,
    pub quiz: Vec<QuizQuestion>,
    pub vault: VaultSecret,
    pub capsule: TimeCapsule,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Default for ContentDocument {
    /// The first-run dataset, used when no stored document exists yet.
    fn default() -> Self {
        Self {
            settings: SiteSettings::default(),
            timeline: vec![
                TimelineEvent {
                    id: new_id(),
                    date: "2022-06-15".to_string(),
                    title: "The First Hello".to_string(),
                    description: "We met at that tiny coffee shop on 4th street. You spilled your latte. I laughed.".to_string(),
                    image: Some("/placeholder/first-meet.jpg".to_string()),
                },
                TimelineEvent {
                    id: new_id(),
                    date: "2022-08-01".to_string(),
                    title: "Making it Official".to_string(),
                    description: "A sunset walk by the pier. You asked, I said yes.".to_string(),
                    image: Some("/placeholder/official.jpg".to_string()),
                },
                TimelineEvent {
                    id: new_id(),
                    date: "2022-12-25".to_string(),
                    title: "Our First Christmas".to_string(),
                    description: "Snowed in at the cabin. The worst hot cocoa ever, but the best company.".to_string(),
                    image: Some("/placeholder/christmas.jpg".to_string()),
                },
                TimelineEvent {
                    id: new_id(),
                    date: "2023-06-15".to_string(),
                    title: "One Year".to_string(),
                    description: "Dinner at the place where we had our first date. No spilled lattes this time.".to_string(),
                    image: Some("/placeholder/anniversary.jpg".to_string()),
                },
                TimelineEvent {
                    id: new_id(),
                    date: "2024-03-10".to_string(),
                    title: "The Big Trip".to_string(),
                    description: "Two weeks in Japan. Cherry blossoms, sushi, and getting lost in Tokyo station.".to_string(),
                    image: Some("/placeholder/japan.jpg".to_string()),
                },
            ],
            gallery: vec![
                GalleryImage {
                    id: new_id(),
                    src: "/placeholder/gallery-1.jpg".to_string(),
                    alt: "Smiling in the rain".to_string(),
                    category: "Candid".to_string(),
                },
                GalleryImage {
                    id: new_id(),
                    src: "/placeholder/gallery-2.jpg".to_string(),
                    alt: "Sunset at the beach".to_string(),
                    category: "Nature".to_string(),
                },
                GalleryImage {
                    id: new_id(),
                    src: "/placeholder/gallery-3.jpg".to_string(),
                    alt: "Coffee date".to_string(),
                    category: "Food".to_string(),
                },
                GalleryImage {
                    id: new_id(),
                    src: "/placeholder/gallery-4.jpg".to_string(),
                    alt: "Holding hands".to_string(),
                    category: "Details".to_string(),
                },
                GalleryImage {
                    id: new_id(),
                    src: "/placeholder/gallery-5.jpg".to_string(),
                    alt: "Road trip vibes".to_string(),
                    category: "Travel".to_string(),
                },
                GalleryImage {
                    id: new_id(),
                    src: "/placeholder/gallery-6.jpg".to_string(),
                    alt: "Lazy Sunday".to_string(),
                    category: "Home".to_string(),
                },
            ],
            locations: vec![
                MapLocation {
                    id: new_id(),
                    lat: 40.7128,
                    lng: -74.0060,
                    title: "Where We Met".to_string(),
                    description: "The Coffee Bean, NYC. The latte incident.".to_string(),
                    date: None,
                    category: None,
                    images: None,
                    notes: None,
                },
                MapLocation {
                    id: new_id(),
                    lat: 35.6762,
                    lng: 139.6503,
                    title: "Our Favorite Trip".to_string(),
                    description: "Tokyo, Japan. Cherry blossoms everywhere.".to_string(),
                    date: None,
                    category: None,
                    images: None,
                    notes: None,
                },
                MapLocation {
                    id: new_id(),
                    lat: 48.8566,
                    lng: 2.3522,
                    title: "Future Plans".to_string(),
                    description: "Paris. One day.".to_string(),
                    date: None,
                    category: None,
                    images: None,
                    notes: None,
                },
            ],
            bucket_list: vec![
                BucketListItem {
                    id: new_id(),
                    text: "Visit Japan for Cherry Blossom season".to_string(),
                    completed: true,
                },
                BucketListItem {
                    id: new_id(),
                    text: "Learn to cook a 3-course Italian meal together".to_string(),
                    completed: false,
                },
                BucketListItem {
                    id: new_id(),
                    text: "Go hot air ballooning in Cappadocia".to_string(),
                    completed: false,
                },
                BucketListItem {
                    id: new_id(),
                    text: "Adopt a golden retriever".to_string(),
                    completed: false,
                },
                BucketListItem {
                    id: new_id(),
                    text: "Watch the sunrise at the Grand Canyon".to_string(),
                    completed: false,
                },
                BucketListItem {
                    id: new_id(),
                    text: "Take a pottery class".to_string(),
                    completed: true,
                },
            ],
            quiz: vec![
                QuizQuestion {
                    id: new_id(),
                    question: "Where was our first date?".to_string(),
                    options: vec![
                        "The Coffee Bean".to_string(),
                        "Central Park".to_string(),
                        "Movie Theater".to_string(),
                        "Italian Restaurant".to_string(),
                    ],
                    answer: "The Coffee Bean".to_string(),
                },
                QuizQuestion {
                    id: new_id(),
                    question: "Who said 'I love you' first?".to_string(),
                    options: vec![
                        "Roshan".to_string(),
                        "Alisha".to_string(),
                        "It was a tie".to_string(),
                        "Nobody yet".to_string(),
                    ],
                    answer: "Alisha".to_string(),
                },
                QuizQuestion {
                    id: new_id(),
                    question: "What is our song?".to_string(),
                    options: vec![
                        "Perfect".to_string(),
                        "All of Me".to_string(),
                        "Lover".to_string(),
                        "Can't Help Falling in Love".to_string(),
                    ],
                    answer: "Lover".to_string(),
                },
                QuizQuestion {
                    id: new_id(),
                    question: "What is our dream travel destination?".to_string(),
                    options: vec![
                        "Paris".to_string(),
                        "Tokyo".to_string(),
                        "Maldives".to_string(),
                        "New York".to_string(),
                    ],
                    answer: "Tokyo".to_string(),
                },
            ],
            vault: VaultSecret::default(),
            capsule: TimeCapsule::default(),
        }
    }
}

// ==================== Request / patch types ====================

/// Rejection produced by the request-layer checks. The store itself never
/// validates; these run before a mutator is called.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("a question needs between 2 and 4 options")]
    OptionCount,
    #[error("options must not repeat")]
    DuplicateOption,
    #[error("the answer must match one of the options")]
    AnswerNotAnOption,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimelineEvent {
    pub date: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewTimelineEvent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.date.trim().is_empty() {
            return Err(ValidationError::Required("date"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::Required("title"));
        }
        Ok(())
    }

    pub fn into_event(self, id: String) -> TimelineEvent {
        TimelineEvent {
            id,
            date: self.date,
            title: self.title,
            description: self.description,
            image: self.image,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineEventPatch {
    pub date: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl TimelineEventPatch {
    pub fn apply(&self, event: &mut TimelineEvent) {
        if let Some(date) = &self.date {
            event.date = date.clone();
        }
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(image) = &self.image {
            event.image = Some(image.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGalleryImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub category: String,
}

impl NewGalleryImage {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.src.trim().is_empty() {
            return Err(ValidationError::Required("src"));
        }
        Ok(())
    }

    pub fn into_image(self, id: String) -> GalleryImage {
        GalleryImage {
            id,
            src: self.src,
            alt: self.alt,
            category: self.category,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GalleryImagePatch {
    pub src: Option<String>,
    pub alt: Option<String>,
    pub category: Option<String>,
}

impl GalleryImagePatch {
    pub fn apply(&self, image: &mut GalleryImage) {
        if let Some(src) = &self.src {
            image.src = src.clone();
        }
        if let Some(alt) = &self.alt {
            image.alt = alt.clone();
        }
        if let Some(category) = &self.category {
            image.category = category.clone();
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapLocation {
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewMapLocation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Required("title"));
        }
        Ok(())
    }

    pub fn into_location(self, id: String) -> MapLocation {
        MapLocation {
            id,
            lat: self.lat,
            lng: self.lng,
            title: self.title,
            description: self.description,
            date: self.date,
            category: self.category,
            images: self.images,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapLocationPatch {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl MapLocationPatch {
    pub fn apply(&self, location: &mut MapLocation) {
        if let Some(lat) = self.lat {
            location.lat = lat;
        }
        if let Some(lng) = self.lng {
            location.lng = lng;
        }
        if let Some(title) = &self.title {
            location.title = title.clone();
        }
        if let Some(description) = &self.description {
            location.description = description.clone();
        }
        if let Some(date) = &self.date {
            location.date = Some(date.clone());
        }
        if let Some(category) = &self.category {
            location.category = Some(category.clone());
        }
        if let Some(images) = &self.images {
            location.images = Some(images.clone());
        }
        if let Some(notes) = &self.notes {
            location.notes = Some(notes.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBucketListItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl NewBucketListItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::Required("text"));
        }
        Ok(())
    }

    pub fn into_item(self, id: String) -> BucketListItem {
        BucketListItem {
            id,
            text: self.text,
            completed: self.completed,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketListItemPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl BucketListItemPatch {
    pub fn apply(&self, item: &mut BucketListItem) {
        if let Some(text) = &self.text {
            item.text = text.clone();
        }
        if let Some(completed) = self.completed {
            item.completed = completed;
        }
    }
}

/// The quiz invariant shared by create and update paths.
pub fn check_quiz_invariants(
    question: &str,
    options: &[String],
    answer: &str,
) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::Required("question"));
    }
    if options.len() < 2 || options.len() > 4 {
        return Err(ValidationError::OptionCount);
    }
    for (i, option) in options.iter().enumerate() {
        if option.trim().is_empty() {
            return Err(ValidationError::Required("options"));
        }
        if options[..i].contains(option) {
            return Err(ValidationError::DuplicateOption);
        }
    }
    if !options.iter().any(|o| o == answer) {
        return Err(ValidationError::AnswerNotAnOption);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl NewQuizQuestion {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_quiz_invariants(&self.question, &self.options, &self.answer)
    }

    pub fn into_question(self, id: String) -> QuizQuestion {
        QuizQuestion {
            id,
            question: self.question,
            options: self.options,
            answer: self.answer,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizQuestionPatch {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<String>,
}

impl QuizQuestionPatch {
    pub fn apply(&self, q: &mut QuizQuestion) {
        if let Some(question) = &self.question {
            q.question = question.clone();
        }
        if let Some(options) = &self.options {
            q.options = options.clone();
        }
        if let Some(answer) = &self.answer {
            q.answer = answer.clone();
        }
    }

    /// The record as it would look after this patch, for validating before
    /// the store is touched.
    pub fn merged(&self, current: &QuizQuestion) -> QuizQuestion {
        let mut merged = current.clone();
        self.apply(&mut merged);
        merged
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettingsPatch {
    pub couple_name: Option<String>,
    pub relationship_start_date: Option<String>,
    pub passcode: Option<String>,
    pub admin_password: Option<String>,
    pub show_timer: Option<bool>,
}

impl SiteSettingsPatch {
    pub fn apply(&self, settings: &mut SiteSettings) {
        if let Some(couple_name) = &self.couple_name {
            settings.couple_name = couple_name.clone();
        }
        if let Some(date) = &self.relationship_start_date {
            settings.relationship_start_date = date.clone();
        }
        if let Some(passcode) = &self.passcode {
            settings.passcode = passcode.clone();
        }
        if let Some(admin_password) = &self.admin_password {
            settings.admin_password = admin_password.clone();
        }
        if let Some(show_timer) = self.show_timer {
            settings.show_timer = show_timer;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSecretPatch {
    pub hidden_message: Option<String>,
    pub sub_message: Option<String>,
    pub code: Option<String>,
}

impl VaultSecretPatch {
    pub fn apply(&self, vault: &mut VaultSecret) {
        if let Some(hidden_message) = &self.hidden_message {
            vault.hidden_message = hidden_message.clone();
        }
        if let Some(sub_message) = &self.sub_message {
            vault.sub_message = sub_message.clone();
        }
        if let Some(code) = &self.code {
            vault.code = code.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeCapsulePatch {
    pub unlock_date: Option<String>,
    pub message: Option<String>,
    pub image: Option<String>,
}

impl TimeCapsulePatch {
    pub fn apply(&self, capsule: &mut TimeCapsule) {
        if let Some(unlock_date) = &self.unlock_date {
            capsule.unlock_date = unlock_date.clone();
        }
        if let Some(message) = &self.message {
            capsule.message = message.clone();
        }
        if let Some(image) = &self.image {
            capsule.image = Some(image.clone());
        }
    }
}

// ==================== Auth request types ====================

#[derive(Debug, Deserialize)]
pub struct PasscodeLoginRequest {
    pub passcode: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

// ==================== Response envelope ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
