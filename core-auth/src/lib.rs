//! # Authentication Module
//!
//! OAuth 2.0 credentials for cloud import sources.
//!
//! ## Overview
//!
//! This module handles the consent step a cloud source (Google Drive) needs
//! before it can list files. It builds PKCE authorization URLs, exchanges the
//! callback code for tokens, refreshes them before they expire and hands
//! connectors a bearer token through the [`TokenProvider`] seam.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flow with PKCE
//! - Automatic token refresh before expiration
//! - Auth state event emission on the core event bus
//! - A static token provider for tests and pre-provisioned hosts

pub mod error;
pub mod oauth;
pub mod provider;
pub mod session;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use provider::{StaticTokenProvider, TokenProvider};
pub use session::OAuthSession;
pub use types::{AuthState, OAuthTokens};
