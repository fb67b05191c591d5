//! Advertisements, categories and advertisement images.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use zesty_core::{
    AccountKind, AdImage, AdStatus, Advertisement, AdvertisementDetail, AdvertisementId,
    Category, CategoryId, Price, PriceError, Profile,
};

use crate::models::AuthSession;
use crate::services::backend::TransportError;
use crate::services::provisioner::ValidationError;
use crate::supabase::{NewAdImage, NewAdvertisement, SupabaseClient, SupabaseError};

/// Errors from listing operations.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid price: {0}")]
    InvalidPrice(#[from] PriceError),

    /// Not an image, or the file name has no usable extension.
    #[error("unsupported image file: {0}")]
    UnsupportedImage(String),

    /// The id cannot name an advertisement.
    #[error("unknown advertisement: {0}")]
    UnknownAdvertisement(String),

    /// The backend refused the write (row level security, constraint).
    #[error("rejected by backend: {0}")]
    Rejected(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ListingError {
    /// Short code carried in the `?error=` query of the listing pages.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Validation(err) => err.code(),
            Self::InvalidPrice(_) => "invalid_price".to_owned(),
            Self::UnsupportedImage(_) => "unsupported_image".to_owned(),
            Self::UnknownAdvertisement(_) => "unknown_advertisement".to_owned(),
            Self::Rejected(_) => "not_allowed".to_owned(),
            Self::Transport(_) => "unavailable".to_owned(),
        }
    }
}

impl From<SupabaseError> for ListingError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Api { status, ref body } if (400..500).contains(&status) => {
                Self::Rejected(body.message().to_owned())
            }
            other => Self::Transport(other.into()),
        }
    }
}

/// Advertisement fields as submitted on the create form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvertisementDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub category_id: String,
}

impl AdvertisementDraft {
    /// Validate the draft and build the row for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ListingError::Validation` for an empty field or
    /// `ListingError::InvalidPrice` for a negative or unparseable price.
    pub fn into_row(self, owner: &Profile) -> Result<NewAdvertisement, ListingError> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("price", &self.price),
            ("category_id", &self.category_id),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field).into());
            }
        }

        let price = Price::parse(self.price.trim())?;
        let owner_id = Some(owner.id().clone());
        let (normal_user_id, business_owner_id) = match owner.kind() {
            AccountKind::Individual => (owner_id, None),
            AccountKind::Business => (None, owner_id),
        };

        Ok(NewAdvertisement {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            price,
            status: AdStatus::Active,
            category_id: CategoryId::new(self.category_id.trim()),
            normal_user_id,
            business_owner_id,
        })
    }
}

/// An image file received from a form upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Lower-cased extension of the file name.
    fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        let ext = ext.trim().to_ascii_lowercase();
        (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
    }
}

/// Longest id accepted from a URL.
const MAX_ADVERTISEMENT_ID_LEN: usize = 64;

/// Check that an id taken from a URL can be used inside a storage path.
///
/// Ids are UUIDs. Anything beyond ASCII letters, digits, `-` and `_` could
/// leave the `advertisements/` folder once the path is joined onto the
/// storage URL.
///
/// # Errors
///
/// Returns `ListingError::UnknownAdvertisement` for any other id.
pub fn check_advertisement_id(advertisement_id: &AdvertisementId) -> Result<(), ListingError> {
    let id = advertisement_id.as_str();
    let safe = !id.is_empty()
        && id.len() <= MAX_ADVERTISEMENT_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if safe {
        Ok(())
    } else {
        Err(ListingError::UnknownAdvertisement(id.to_owned()))
    }
}

/// Storage path of an advertisement image.
///
/// # Errors
///
/// Returns `ListingError::UnknownAdvertisement` if the id is not safe to
/// place in a path.
pub fn image_object_path(
    advertisement_id: &AdvertisementId,
    order: i32,
    extension: &str,
) -> Result<String, ListingError> {
    check_advertisement_id(advertisement_id)?;
    Ok(format!("advertisements/{advertisement_id}-{order}.{extension}"))
}

/// Listing service.
pub struct ListingService<'a> {
    client: &'a SupabaseClient,
}

impl<'a> ListingService<'a> {
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// All advertisements, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ListingError::Transport` if the backend is unavailable.
    pub async fn list_advertisements(
        &self,
        session: Option<&AuthSession>,
    ) -> Result<Vec<AdvertisementDetail>, ListingError> {
        Ok(self.client.list_advertisements(session).await?)
    }

    /// One advertisement, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ListingError::Transport` if the backend is unavailable.
    pub async fn get_advertisement(
        &self,
        id: &AdvertisementId,
        session: Option<&AuthSession>,
    ) -> Result<Option<AdvertisementDetail>, ListingError> {
        Ok(self.client.get_advertisement(id, session).await?)
    }

    /// Categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `ListingError::Transport` if the backend is unavailable.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ListingError> {
        Ok(self.client.list_categories().await?)
    }

    /// Create an advertisement owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any write, or the backend failure.
    #[instrument(skip(self, owner, draft, session), fields(user_id = %owner.id()))]
    pub async fn create_advertisement(
        &self,
        owner: &Profile,
        draft: AdvertisementDraft,
        session: &AuthSession,
    ) -> Result<Advertisement, ListingError> {
        let row = draft.into_row(owner)?;
        let advertisement = self
            .client
            .insert_advertisement(&row, Some(session))
            .await?;

        info!(advertisement_id = %advertisement.id, "Advertisement created");
        Ok(advertisement)
    }

    /// Upload an image for an advertisement and record it.
    ///
    /// # Errors
    ///
    /// Returns `ListingError::UnknownAdvertisement` for an id that cannot be
    /// placed in a storage path, `ListingError::UnsupportedImage` when the
    /// file is not an image or its name has no extension, or the backend
    /// failure of the upload or the insert.
    #[instrument(skip(self, upload, session))]
    pub async fn upload_image(
        &self,
        advertisement_id: &AdvertisementId,
        order: i32,
        upload: ImageUpload,
        session: &AuthSession,
    ) -> Result<AdImage, ListingError> {
        check_advertisement_id(advertisement_id)?;
        if !upload.content_type.starts_with("image/") {
            return Err(ListingError::UnsupportedImage(upload.content_type));
        }
        let extension = upload
            .extension()
            .ok_or_else(|| ListingError::UnsupportedImage(upload.file_name.clone()))?;
        let object_path = image_object_path(advertisement_id, order, &extension)?;

        self.client
            .upload_object(&object_path, upload.bytes, &upload.content_type, Some(session))
            .await?;
        let url = self.client.public_url(&object_path)?;

        let image = self
            .client
            .insert_image(
                &NewAdImage {
                    advertisement_id: advertisement_id.clone(),
                    url: url.to_string(),
                    order,
                },
                Some(session),
            )
            .await?;

        info!(image_id = %image.id, "Advertisement image stored");
        Ok(image)
    }
}
