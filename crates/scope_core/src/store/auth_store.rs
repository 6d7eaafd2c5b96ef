//! Sign-in state for the patient app.
//!
//! # Responsibility
//! - Drive sign-in, the temporary-password challenge and sign-out against an
//!   external identity provider.
//! - Track the identity lookup that follows a successful sign-in.
//!
//! # Invariants
//! - `current_identity` is only exposed while `Authenticated`.
//! - `auth_state_detail` is only exposed while `AuthenticationFailed`.
//! - Tokens and passwords never reach log lines.

use crate::client::{TransportError, TransportResult};
use crate::query::{QueryError, QuerySnapshot, QueryTracker};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Initialized,
    NewPasswordRequired,
    Authenticated,
    AuthenticationFailed,
}

/// Patient record the identity service resolves a token to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    pub identity_id: String,
    pub patient_id: String,
    pub name: String,
    #[serde(rename = "MRN", skip_serializing_if = "Option::is_none")]
    pub mrn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientUser {
    pub identity: PatientIdentity,
    pub auth_token: String,
}

/// Result of presenting credentials to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    Session { id_token: String },
    /// Credentials were accepted but the password is temporary.
    NewPasswordRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    SignIn(TransportError),
    NewPasswordRequired,
    NoPendingChallenge,
    Identity(QueryError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignIn(err) => write!(f, "sign-in failed: {err}"),
            Self::NewPasswordRequired => write!(f, "a new password is required"),
            Self::NoPendingChallenge => write!(f, "no password challenge is pending"),
            Self::Identity(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SignIn(err) => Some(err),
            Self::Identity(err) => Some(err),
            Self::NewPasswordRequired | Self::NoPendingChallenge => None,
        }
    }
}

/// External identity provider (user pool plus identity service).
#[async_trait(?Send)]
pub trait IdentityProvider {
    async fn authenticate(&self, username: &str, password: &str)
        -> TransportResult<SignInOutcome>;

    /// Answers a temporary-password challenge; returns the new id token.
    async fn complete_new_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> TransportResult<String>;

    async fn fetch_identity(&self, id_token: &str) -> TransportResult<PatientIdentity>;

    fn sign_out(&self, username: &str);
}

pub struct AuthStore<P> {
    provider: P,
    state: Cell<AuthState>,
    /// Username of the current or challenged sign-in.
    username: RefCell<Option<String>>,
    error_detail: RefCell<String>,
    auth_query: QueryTracker<PatientUser>,
}

impl<P: IdentityProvider> AuthStore<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: Cell::new(AuthState::Initialized),
            username: RefCell::new(None),
            error_detail: RefCell::new(String::new()),
            auth_query: QueryTracker::new("authQuery"),
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.state.get()
    }

    /// Signed in with a usable token.
    pub fn is_authenticated(&self) -> bool {
        self.current_identity()
            .is_some_and(|user| !user.auth_token.is_empty())
    }

    pub fn current_identity(&self) -> Option<PatientUser> {
        if self.state.get() == AuthState::Authenticated {
            self.auth_query.value()
        } else {
            None
        }
    }

    pub fn auth_state_detail(&self) -> Option<String> {
        if self.state.get() == AuthState::AuthenticationFailed {
            Some(self.error_detail.borrow().clone())
        } else {
            None
        }
    }

    pub fn auth_snapshot(&self) -> QuerySnapshot {
        self.auth_query.snapshot()
    }

    /// Signs in and resolves the patient identity.
    ///
    /// # Errors
    /// `NewPasswordRequired` leaves the store waiting for
    /// `update_temp_password`; every other error leaves it
    /// `AuthenticationFailed`.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.state.set(AuthState::Initialized);

        match self.provider.authenticate(username, password).await {
            Ok(SignInOutcome::Session { id_token }) => {
                info!("event=auth_sign_in module=auth status=ok");
                *self.username.borrow_mut() = Some(username.to_string());
                self.resolve_identity(id_token).await
            }
            Ok(SignInOutcome::NewPasswordRequired) => {
                info!("event=auth_sign_in module=auth status=new_password_required");
                *self.username.borrow_mut() = Some(username.to_string());
                self.state.set(AuthState::NewPasswordRequired);
                Err(AuthError::NewPasswordRequired)
            }
            Err(err) => {
                self.fail(err.to_string());
                Err(AuthError::SignIn(err))
            }
        }
    }

    /// Answers the pending temporary-password challenge.
    pub async fn update_temp_password(&self, new_password: &str) -> Result<(), AuthError> {
        let pending = self.username.borrow().clone();
        let Some(username) = pending.filter(|_| self.state.get() == AuthState::NewPasswordRequired)
        else {
            return Err(AuthError::NoPendingChallenge);
        };

        match self
            .provider
            .complete_new_password(&username, new_password)
            .await
        {
            Ok(id_token) => {
                info!("event=auth_password_challenge module=auth status=ok");
                self.resolve_identity(id_token).await
            }
            Err(err) => {
                self.fail(err.to_string());
                Err(AuthError::SignIn(err))
            }
        }
    }

    pub fn logout(&self) {
        if let Some(username) = self.username.borrow_mut().take() {
            self.provider.sign_out(&username);
        }
        self.state.set(AuthState::Initialized);
        info!("event=auth_sign_out module=auth status=ok");
    }

    async fn resolve_identity(&self, id_token: String) -> Result<(), AuthError> {
        let provider = &self.provider;
        let token = id_token.as_str();
        let resolved = self
            .auth_query
            .run(move || async move {
                let identity = provider.fetch_identity(token).await?;
                Ok(PatientUser {
                    identity,
                    auth_token: token.to_string(),
                })
            })
            .await;

        match resolved {
            Ok(_) => {
                self.state.set(AuthState::Authenticated);
                info!("event=auth_identity module=auth status=ok");
                Ok(())
            }
            Err(err) => {
                self.fail(err.message());
                Err(AuthError::Identity(err))
            }
        }
    }

    fn fail(&self, detail: String) {
        warn!("event=auth_failed module=auth status=error");
        self.username.borrow_mut().take();
        *self.error_detail.borrow_mut() = detail;
        self.state.set(AuthState::AuthenticationFailed);
    }
}
