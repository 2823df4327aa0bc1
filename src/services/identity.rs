use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt};

use crate::error::{AppError, Result};

/// Query parameters the provider redirected back with.
pub type CallbackParams = HashMap<String, String>;

/// An identity the provider vouched for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub name: String,
    pub email: String,
}

/// The external identity provider.
///
/// The handshake itself (authorization codes, token exchange, user info) is
/// the provider's business; the application only starts it and consumes the
/// verified result.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Where the login-initiation endpoint sends the browser.
    fn authorize_url(&self) -> String;

    /// Finishes the handshake from the callback parameters.
    fn complete<'a>(&'a self, params: &'a CallbackParams) -> BoxFuture<'a, Result<VerifiedIdentity>>;
}

/// Development provider: trusts `name` and `email` from the callback query.
pub struct DevIdentityProvider;

impl IdentityProvider for DevIdentityProvider {
    fn authorize_url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("name", crate::middleware_layer::auth::PLACEHOLDER_NAME)
            .append_pair("email", crate::middleware_layer::auth::PLACEHOLDER_EMAIL)
            .finish();
        format!("/auth/callback?{}", query)
    }

    fn complete<'a>(&'a self, params: &'a CallbackParams) -> BoxFuture<'a, Result<VerifiedIdentity>> {
        async move {
            if let Some(error) = params.get("error") {
                return Err(AppError::Unauthorized(format!("provider returned error: {}", error)));
            }

            let name = params
                .get("name")
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .ok_or_else(|| AppError::Unauthorized("missing name".to_string()))?;

            let email = params
                .get("email")
                .map(|e| e.trim())
                .filter(|e| e.contains('@'))
                .ok_or_else(|| AppError::Unauthorized("missing or invalid email".to_string()))?;

            Ok(VerifiedIdentity {
                name: name.to_string(),
                email: email.to_string(),
            })
        }
        .boxed()
    }
}

/// Installed in production until a real provider is wired in; every
/// callback fails.
pub struct UnconfiguredIdentityProvider;

impl IdentityProvider for UnconfiguredIdentityProvider {
    fn authorize_url(&self) -> String {
        "/auth/callback".to_string()
    }

    fn complete<'a>(&'a self, _params: &'a CallbackParams) -> BoxFuture<'a, Result<VerifiedIdentity>> {
        futures::future::ready(Err(AppError::Unauthorized(
            "no identity provider configured".to_string(),
        )))
        .boxed()
    }
}
