//! PostgREST (`rest/v1`) queries.

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use zesty_core::{
    AccountKind, AdImage, Advertisement, AdvertisementDetail, AdvertisementId, Category, Email,
    Profile,
};

use super::types::{NewAdImage, NewAdvertisement};
use super::{SupabaseClient, SupabaseError};
use crate::models::AuthSession;
use crate::services::backend::{InsertError, ProfileStore, TransportError};

/// Resource embedding for an advertisement with its owner, category and
/// images.
const ADVERTISEMENT_DETAIL_SELECT: &str = "*,normal_user:normal_user_id(*),business_owner:business_owner_id(*),category:category_id(*),images(*)";

/// Postgres unique and foreign key violation codes.
const CONSTRAINT_VIOLATION_CODES: &[&str] = &["23505", "23503"];

/// Literal `ilike` pattern for an address.
///
/// `%`, `_` and backslash are escaped. PostgREST reads `*` as `%`, so it becomes
/// the single character wildcard `_` and the caller rechecks the match.
fn ilike_pattern(email: &Email) -> String {
    let mut pattern = String::with_capacity(email.as_str().len());
    for c in email.as_str().chars() {
        match c {
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            _ => pattern.push(c),
        }
    }
    pattern
}

impl SupabaseClient {
    fn table_url(&self, table: &str) -> Result<Url, SupabaseError> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    /// Insert one row and return its representation.
    async fn insert_row<B, T>(
        &self,
        table: &str,
        row: &B,
        session: Option<&AuthSession>,
    ) -> Result<T, SupabaseError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.table_url(table)?;
        let request = self
            .request(Method::POST, url, session)
            .header("Prefer", "return=representation")
            .json(row);

        let rows: Vec<T> = self.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SupabaseError::Unexpected(format!("insert into {table} returned no row")))
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Fetch the profile of `kind` whose email matches, ignoring case.
    ///
    /// Profile rows keep the address as it was typed at registration, so the
    /// filter is `ilike` and the rows are compared again locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row has the wrong shape.
    #[instrument(skip(self, session), fields(table = kind.table(), email = %email))]
    pub async fn select_profile(
        &self,
        kind: AccountKind,
        email: &Email,
        session: Option<&AuthSession>,
    ) -> Result<Option<Profile>, SupabaseError> {
        let mut url = self.table_url(kind.table())?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("email", &format!("ilike.{}", ilike_pattern(email)));

        let rows: Vec<serde_json::Value> = self
            .send_json(self.request(Method::GET, url, session))
            .await?;

        for row in rows {
            let profile = Profile::decode(kind, row)?;
            if profile.base().email.as_str().to_lowercase() == email.as_str() {
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    /// Insert a profile row, optionally ignoring a duplicate id.
    ///
    /// Returns `None` only when `ignore_duplicates` is set and the row was
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row is refused.
    #[instrument(skip(self, profile, session), fields(table = profile.kind().table(), user_id = %profile.id()))]
    pub async fn insert_profile(
        &self,
        profile: &Profile,
        ignore_duplicates: bool,
        session: Option<&AuthSession>,
    ) -> Result<Option<Profile>, SupabaseError> {
        let kind = profile.kind();
        let mut url = self.table_url(kind.table())?;
        let prefer = if ignore_duplicates {
            url.query_pairs_mut().append_pair("on_conflict", "id");
            "resolution=ignore-duplicates,return=representation"
        } else {
            "return=representation"
        };

        let request = self
            .request(Method::POST, url, session)
            .header("Prefer", prefer)
            .json(profile);

        let rows: Vec<serde_json::Value> = self.send_json(request).await?;
        let inserted = rows
            .into_iter()
            .next()
            .map(|row| Profile::decode(kind, row))
            .transpose()?;

        if inserted.is_none() && !ignore_duplicates {
            return Err(SupabaseError::Unexpected(format!(
                "insert into {} returned no row",
                kind.table()
            )));
        }

        Ok(inserted)
    }

    // =========================================================================
    // Advertisements
    // =========================================================================

    /// All advertisements, newest first, with owner, category and images.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_advertisements(
        &self,
        session: Option<&AuthSession>,
    ) -> Result<Vec<AdvertisementDetail>, SupabaseError> {
        let mut url = self.table_url("advertisements")?;
        url.query_pairs_mut()
            .append_pair("select", ADVERTISEMENT_DETAIL_SELECT)
            .append_pair("order", "created_at.desc");

        self.send_json(self.request(Method::GET, url, session))
            .await
    }

    /// One advertisement with owner, category and images.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session), fields(advertisement_id = %id))]
    pub async fn get_advertisement(
        &self,
        id: &AdvertisementId,
        session: Option<&AuthSession>,
    ) -> Result<Option<AdvertisementDetail>, SupabaseError> {
        let mut url = self.table_url("advertisements")?;
        url.query_pairs_mut()
            .append_pair("select", ADVERTISEMENT_DETAIL_SELECT)
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("limit", "1");

        let rows: Vec<AdvertisementDetail> = self
            .send_json(self.request(Method::GET, url, session))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Insert an advertisement.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row is refused.
    #[instrument(skip(self, advertisement, session), fields(title = %advertisement.title))]
    pub async fn insert_advertisement(
        &self,
        advertisement: &NewAdvertisement,
        session: Option<&AuthSession>,
    ) -> Result<Advertisement, SupabaseError> {
        self.insert_row("advertisements", advertisement, session)
            .await
    }

    /// Insert an `images` row.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row is refused.
    #[instrument(skip(self, image, session), fields(advertisement_id = %image.advertisement_id))]
    pub async fn insert_image(
        &self,
        image: &NewAdImage,
        session: Option<&AuthSession>,
    ) -> Result<AdImage, SupabaseError> {
        self.insert_row("images", image, session).await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, SupabaseError> {
        let mut url = self.table_url("categories")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "name.asc");

        self.send_json(self.request(Method::GET, url, None)).await
    }
}

impl ProfileStore for SupabaseClient {
    async fn find_by_email(
        &self,
        kind: AccountKind,
        email: &Email,
        session: Option<&AuthSession>,
    ) -> Result<Option<Profile>, TransportError> {
        Ok(self.select_profile(kind, email, session).await?)
    }

    async fn insert(
        &self,
        profile: &Profile,
        session: Option<&AuthSession>,
    ) -> Result<Profile, InsertError> {
        match self.insert_profile(profile, false, session).await {
            Ok(Some(inserted)) => Ok(inserted),
            Ok(None) => Err(InsertError::Transport(TransportError::Malformed(
                "insert returned no row".to_string(),
            ))),
            Err(e) => Err(classify_insert_error(e)),
        }
    }

    async fn insert_if_absent(
        &self,
        profile: &Profile,
        session: Option<&AuthSession>,
    ) -> Result<Option<Profile>, InsertError> {
        self.insert_profile(profile, true, session)
            .await
            .map_err(classify_insert_error)
    }
}

/// Map a failed insert onto the insert taxonomy.
pub(super) fn classify_insert_error(err: SupabaseError) -> InsertError {
    match err {
        SupabaseError::Api { status, ref body }
            if status == 409
                || CONSTRAINT_VIOLATION_CODES
                    .iter()
                    .any(|code| body.has_code(code)) =>
        {
            InsertError::ConstraintViolation(body.message().to_owned())
        }
        other => InsertError::Transport(other.into()),
    }
}
