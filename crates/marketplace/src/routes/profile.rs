//! Profile pages.
//!
//! These routes require authentication. Each resolves the signed-in account
//! and either renders it or redirects to the page of the account's kind.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use zesty_core::{AccountKind, BusinessProfile, IndividualProfile, Profile};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::AuthSession;
use crate::services::{AuthError, Destination, IdentityResolver, Resolution};
use crate::state::AppState;

/// Individual profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/individual.html")]
pub struct IndividualProfileTemplate {
    pub signed_in: bool,
    pub profile: IndividualProfile,
    pub ad_allowance: u32,
}

/// Business dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/business.html")]
pub struct BusinessDashboardTemplate {
    pub signed_in: bool,
    pub profile: BusinessProfile,
    pub ad_allowance: u32,
}

/// Redirect to the page of the signed-in account's kind.
pub async fn account(State(state): State<AppState>, RequireAuth(auth): RequireAuth) -> Response {
    match resolve(&state, &auth).await {
        Ok(resolution) => Redirect::to(resolution.destination().path()).into_response(),
        Err(e) => auth_failure(e),
    }
}

/// Display the individual profile page.
pub async fn user_profile(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
) -> Response {
    match resolve(&state, &auth).await {
        Ok(resolution) => match resolution.into_profile() {
            Profile::Individual(profile) => IndividualProfileTemplate {
                signed_in: true,
                profile,
                ad_allowance: AccountKind::Individual.monthly_ad_allowance(),
            }
            .into_response(),
            other => redirect_to_own_page(&other),
        },
        Err(e) => auth_failure(e),
    }
}

/// Display the business dashboard.
pub async fn business_dashboard(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
) -> Response {
    match resolve(&state, &auth).await {
        Ok(resolution) => match resolution.into_profile() {
            Profile::Business(profile) => BusinessDashboardTemplate {
                signed_in: true,
                profile,
                ad_allowance: AccountKind::Business.monthly_ad_allowance(),
            }
            .into_response(),
            other => redirect_to_own_page(&other),
        },
        Err(e) => auth_failure(e),
    }
}

/// Resolve the signed-in account.
#[instrument(skip_all, fields(user_id = %auth.identity_id()))]
pub(super) async fn resolve(state: &AppState, auth: &AuthSession) -> Result<Resolution, AuthError> {
    let supabase = state.supabase();
    let resolved = IdentityResolver::new(supabase, supabase)
        .resolve(Some(auth))
        .await?;
    Ok(resolved.resolution)
}

fn redirect_to_own_page(profile: &Profile) -> Response {
    Redirect::to(Destination::for_kind(profile.kind()).path()).into_response()
}

/// Redirect when the error names a page, otherwise render it.
pub(super) fn auth_failure(err: AuthError) -> Response {
    match err.destination() {
        Some(destination) => Redirect::to(destination.path()).into_response(),
        None => AppError::from(err).into_response(),
    }
}
