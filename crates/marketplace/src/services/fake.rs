//! In-memory backend for service tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use zesty_core::{
    AccountKind, BusinessProfile, Email, Identity, IdentityId, IndividualProfile, Profile,
    ProfileBase,
};

use super::backend::{
    AuthProvider, InsertError, ProfileStore, SignInError, SignUpError, SignUpOutcome,
    TransportError,
};
use crate::models::AuthSession;

struct Account {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    tables: HashMap<AccountKind, Vec<Profile>>,
    insert_attempts: usize,
    sign_outs: usize,
    failing_lookups: HashSet<AccountKind>,
    fail_inserts: bool,
    fail_sign_out: bool,
    session_check_failure: Option<TransportError>,
    sign_in_failure: Option<TransportError>,
}

/// Implements both backend traits over plain collections.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    sessions_on_sign_up: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups confirm the email immediately and return a session.
    pub fn issuing_sessions_on_sign_up(mut self) -> Self {
        self.sessions_on_sign_up = true;
        self
    }

    fn add_account(&self, email: &str, password: &str, confirmed: bool) -> Identity {
        let mut state = self.state.lock().unwrap();
        let identity = Identity {
            id: IdentityId::new(format!("u-{}", state.accounts.len() + 1)),
            email: Email::parse(email).unwrap(),
            email_verified: confirmed,
        };
        state.accounts.push(Account {
            identity: identity.clone(),
            password: password.to_owned(),
        });
        identity
    }

    /// Create a confirmed account and return a live session for it.
    pub fn register_confirmed(&self, email: &str, password: &str) -> AuthSession {
        session_for(self.add_account(email, password, true))
    }

    pub fn register_unconfirmed(&self, email: &str, password: &str) -> Identity {
        self.add_account(email, password, false)
    }

    /// Put a profile row in place without counting it as an insert.
    pub fn seed(&self, profile: Profile) {
        let mut state = self.state.lock().unwrap();
        state.tables.entry(profile.kind()).or_default().push(profile);
    }

    pub fn identity_for(&self, email: &str) -> Option<Identity> {
        let email = Email::parse(email).ok()?;
        let state = self.state.lock().unwrap();
        state
            .accounts
            .iter()
            .find(|a| a.identity.email == email)
            .map(|a| a.identity.clone())
    }

    pub fn profiles(&self, kind: AccountKind) -> Vec<Profile> {
        let state = self.state.lock().unwrap();
        state.tables.get(&kind).cloned().unwrap_or_default()
    }

    /// Number of insert calls, failed ones included.
    pub fn insert_count(&self) -> usize {
        self.state.lock().unwrap().insert_attempts
    }

    pub fn sign_out_count(&self) -> usize {
        self.state.lock().unwrap().sign_outs
    }

    pub fn fail_inserts(&self) {
        self.state.lock().unwrap().fail_inserts = true;
    }

    pub fn fail_lookups(&self, kind: AccountKind) {
        self.state.lock().unwrap().failing_lookups.insert(kind);
    }

    pub fn fail_session_checks(&self, error: TransportError) {
        self.state.lock().unwrap().session_check_failure = Some(error);
    }

    pub fn fail_sign_in(&self, error: TransportError) {
        self.state.lock().unwrap().sign_in_failure = Some(error);
    }

    pub fn fail_sign_out(&self) {
        self.state.lock().unwrap().fail_sign_out = true;
    }

    fn insert_row(&self, profile: &Profile, ignore_duplicates: bool) -> Result<Option<Profile>, InsertError> {
        let mut state = self.state.lock().unwrap();
        state.insert_attempts += 1;
        if state.fail_inserts {
            return Err(InsertError::Transport(TransportError::Unreachable(
                "connection reset".to_owned(),
            )));
        }

        let table = state.tables.entry(profile.kind()).or_default();
        if table.iter().any(|row| row.id() == profile.id()) {
            if ignore_duplicates {
                return Ok(None);
            }
            return Err(InsertError::ConstraintViolation(format!(
                "duplicate key: {}",
                profile.id()
            )));
        }

        table.push(profile.clone());
        Ok(Some(profile.clone()))
    }
}

fn session_for(identity: Identity) -> AuthSession {
    AuthSession::new(
        SecretString::from(format!("token-{}", identity.id)),
        SecretString::from(format!("refresh-{}", identity.id)),
        Utc::now() + Duration::hours(1),
        identity,
    )
}

impl AuthProvider for FakeBackend {
    async fn get_session(
        &self,
        stored: Option<&AuthSession>,
    ) -> Result<Option<AuthSession>, TransportError> {
        if let Some(error) = self.state.lock().unwrap().session_check_failure.clone() {
            return Err(error);
        }
        Ok(stored.filter(|s| !s.is_expired(Utc::now())).cloned())
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, SignInError> {
        let state = self.state.lock().unwrap();
        if let Some(error) = state.sign_in_failure.clone() {
            return Err(SignInError::Transport(error));
        }

        let account = state
            .accounts
            .iter()
            .find(|a| &a.identity.email == email && a.password == password.expose_secret())
            .ok_or(SignInError::InvalidCredentials)?;

        if !account.identity.email_verified {
            return Err(SignInError::EmailUnconfirmed);
        }
        Ok(session_for(account.identity.clone()))
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, SignUpError> {
        if self.identity_for(email.as_str()).is_some() {
            return Err(SignUpError::DuplicateEmail);
        }

        let identity = self.add_account(
            email.as_str(),
            password.expose_secret(),
            self.sessions_on_sign_up,
        );
        let session = self
            .sessions_on_sign_up
            .then(|| session_for(identity.clone()));
        Ok(SignUpOutcome { identity, session })
    }

    async fn sign_out(&self, _session: &AuthSession) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.sign_outs += 1;
        if state.fail_sign_out {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }

    async fn get_identity(&self, session: &AuthSession) -> Result<Identity, TransportError> {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .iter()
            .find(|a| &a.identity.id == session.identity_id())
            .map(|a| a.identity.clone())
            .ok_or_else(|| TransportError::Backend {
                status: 404,
                message: "user not found".to_owned(),
            })
    }
}

impl ProfileStore for FakeBackend {
    async fn find_by_email(
        &self,
        kind: AccountKind,
        email: &Email,
        _session: Option<&AuthSession>,
    ) -> Result<Option<Profile>, TransportError> {
        let state = self.state.lock().unwrap();
        if state.failing_lookups.contains(&kind) {
            return Err(TransportError::Backend {
                status: 500,
                message: "lookup failed".to_owned(),
            });
        }
        Ok(state
            .tables
            .get(&kind)
            .and_then(|rows| rows.iter().find(|p| p.email() == email))
            .cloned())
    }

    async fn insert(
        &self,
        profile: &Profile,
        _session: Option<&AuthSession>,
    ) -> Result<Profile, InsertError> {
        self.insert_row(profile, false)
            .map(|inserted| inserted.unwrap_or_else(|| profile.clone()))
    }

    async fn insert_if_absent(
        &self,
        profile: &Profile,
        _session: Option<&AuthSession>,
    ) -> Result<Option<Profile>, InsertError> {
        self.insert_row(profile, true)
    }
}

pub fn individual_profile(id: &str, email: &str) -> Profile {
    Profile::Individual(IndividualProfile {
        base: ProfileBase {
            id: IdentityId::new(id),
            email: Email::parse(email).unwrap(),
            full_name: "Ann".to_owned(),
            phone: "555".to_owned(),
        },
        avatar_url: None,
    })
}

pub fn business_profile(id: &str, email: &str) -> Profile {
    Profile::Business(BusinessProfile {
        base: ProfileBase {
            id: IdentityId::new(id),
            email: Email::parse(email).unwrap(),
            full_name: "Bo".to_owned(),
            phone: "555".to_owned(),
        },
        logo_url: None,
        business_name: "Bo's Bikes".to_owned(),
        business_address: "1 Main St".to_owned(),
    })
}
