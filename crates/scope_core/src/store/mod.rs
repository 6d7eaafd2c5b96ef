//! Domain stores: the single writers of patient and auth state.

pub mod auth_store;
pub mod patient_store;

pub use auth_store::{
    AuthError, AuthState, AuthStore, IdentityProvider, PatientIdentity, PatientUser,
    SignInOutcome,
};
pub use patient_store::{Operation, PatientStore, StoreResult};
