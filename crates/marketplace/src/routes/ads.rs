//! Advertisement route handlers.
//!
//! Browsing is open to everyone; creating an advertisement and adding
//! images require a signed-in account. Row level security on the backend
//! decides who may write what.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, info, warn};

use zesty_core::{AdvertisementDetail, AdvertisementId, Category, Profile};

use super::auth::MessageQuery;
use super::messages::{error_message, success_message};
use super::profile::{auth_failure, resolve};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::services::{
    AdvertisementDraft, ImageUpload, ListingError, ListingService, check_advertisement_id,
};
use crate::state::AppState;

/// Largest accepted image upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// View Types
// =============================================================================

/// Advertisement summary for the list page.
#[derive(Clone)]
pub struct AdCard {
    pub id: String,
    pub title: String,
    pub price: String,
    pub status: String,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub cover_url: Option<String>,
}

impl From<&AdvertisementDetail> for AdCard {
    fn from(detail: &AdvertisementDetail) -> Self {
        let ad = &detail.advertisement;
        Self {
            id: ad.id.to_string(),
            title: ad.title.clone(),
            price: ad.price.to_string(),
            status: ad.status.to_string(),
            category: detail.category.as_ref().map(|c| c.name.clone()),
            owner: detail.owner().as_ref().map(display_name),
            cover_url: detail.ordered_images().first().map(|image| image.url.clone()),
        }
    }
}

/// Name shown for the account behind an advertisement.
fn display_name(profile: &Profile) -> String {
    match profile {
        Profile::Business(p) => p.business_name.clone(),
        Profile::Individual(p) => p.base.full_name.clone(),
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Advertisement list template.
#[derive(Template, WebTemplate)]
#[template(path = "ads/list.html")]
pub struct AdListTemplate {
    pub signed_in: bool,
    pub ads: Vec<AdCard>,
    pub categories: Vec<Category>,
    pub error: Option<String>,
    pub success: Option<&'static str>,
}

/// Advertisement detail template.
#[derive(Template, WebTemplate)]
#[template(path = "ads/detail.html")]
pub struct AdDetailTemplate {
    pub signed_in: bool,
    pub card: AdCard,
    pub description: String,
    pub posted_on: String,
    pub views_count: i64,
    pub image_urls: Vec<String>,
    pub can_upload: bool,
    pub next_order: usize,
    pub error: Option<String>,
    pub success: Option<&'static str>,
}

// =============================================================================
// Browse Routes
// =============================================================================

/// Display all advertisements with the create form for signed-in visitors.
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let listings = ListingService::new(state.supabase());
    let (ads, categories) = tokio::try_join!(
        listings.list_advertisements(current.as_ref()),
        listings.list_categories(),
    )?;

    Ok(AdListTemplate {
        signed_in: current.is_some(),
        ads: ads.iter().map(AdCard::from).collect(),
        categories,
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().and_then(success_message),
    })
}

/// Display one advertisement.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let id = AdvertisementId::new(id);
    let detail = ListingService::new(state.supabase())
        .get_advertisement(&id, current.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("advertisement {id}")))?;

    let can_upload = current.as_ref().is_some_and(|auth| {
        detail.advertisement.owner_id() == Some(auth.identity_id())
    });
    let image_urls: Vec<String> = detail
        .ordered_images()
        .into_iter()
        .map(|image| image.url.clone())
        .collect();
    let ad = &detail.advertisement;

    Ok(AdDetailTemplate {
        signed_in: current.is_some(),
        card: AdCard::from(&detail),
        description: ad.description.clone(),
        posted_on: ad.created_at.format("%e %B %Y").to_string(),
        views_count: ad.views_count,
        next_order: image_urls.len(),
        image_urls,
        can_upload,
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().and_then(success_message),
    })
}

// =============================================================================
// Write Routes
// =============================================================================

/// Handle the create form. The signed-in account becomes the owner.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Form(draft): Form<AdvertisementDraft>,
) -> Response {
    let owner = match resolve(&state, &auth).await {
        Ok(resolution) => resolution.into_profile(),
        Err(e) => return auth_failure(e),
    };

    match ListingService::new(state.supabase())
        .create_advertisement(&owner, draft, &auth)
        .await
    {
        Ok(ad) => {
            add_breadcrumb("ads", "Advertisement created", Some(&[("id", ad.id.as_str())]));
            Redirect::to(&format!("/ads/{}?success=created", ad.id)).into_response()
        }
        Err(e) => {
            report(&e, "Advertisement not created");
            Redirect::to(&format!("/ads?error={}", e.code())).into_response()
        }
    }
}

/// Handle a multipart image upload for an advertisement.
///
/// Fields: `image` (the file) and `order` (display position, default 0).
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let id = AdvertisementId::new(id);
    if let Err(e) = check_advertisement_id(&id) {
        warn!(error = %e, "Image upload for an unusable advertisement id");
        return Redirect::to(&format!("/ads?error={}", e.code())).into_response();
    }
    let back = |query: String| Redirect::to(&format!("/ads/{id}?{query}")).into_response();

    let (order, upload) = match read_upload(multipart).await {
        Ok((order, Some(upload))) => (order, upload),
        Ok((_, None)) => return back("error=missing_image".to_owned()),
        Err(e) => {
            warn!(error = %e, "Unreadable image upload");
            return back("error=invalid_upload".to_owned());
        }
    };

    match ListingService::new(state.supabase())
        .upload_image(&id, order, upload, &auth)
        .await
    {
        Ok(image) => {
            info!(advertisement_id = %id, order = image.order, "Image uploaded");
            back("success=uploaded".to_owned())
        }
        Err(e) => {
            report(&e, "Image not stored");
            back(format!("error={}", e.code()))
        }
    }
}

/// Why an upload form could not be read.
#[derive(Debug, Error)]
enum UploadFormError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("invalid image order: {0:?}")]
    InvalidOrder(String),
}

/// Parse the `order` field. Blank means the first position.
fn parse_order(raw: &str) -> std::result::Result<i32, UploadFormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i32>()
        .ok()
        .filter(|order| *order >= 0)
        .ok_or_else(|| UploadFormError::InvalidOrder(raw.to_owned()))
}

/// Pull the `order` and `image` fields out of the form.
///
/// An empty file input counts as no image.
async fn read_upload(
    mut multipart: Multipart,
) -> std::result::Result<(i32, Option<ImageUpload>), UploadFormError> {
    let mut order = 0;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("order") => {
                order = parse_order(&field.text().await?)?;
            }
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    upload = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((order, upload))
}

fn report(err: &ListingError, message: &str) {
    if matches!(err, ListingError::Transport(_)) {
        error!(error = %err, "{message}");
    } else {
        info!(error = %err, "{message}");
    }
}
