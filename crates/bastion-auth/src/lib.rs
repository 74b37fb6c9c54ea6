//! Bastion Auth: password login, EdDSA JWT access tokens and refresh
//! token rotation.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::{AuthConfig, Lifetimes};
pub use error::AuthError;
pub use service::{AuthService, LoginInput, LoginOutput, RefreshInput};
pub use token::{AccessTokenClaims, TokenSigner, ValidatedClaims};
