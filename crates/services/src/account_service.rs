use std::sync::Arc;

use study_api::{AuthApi, AuthSession};

use crate::error::{ServiceError, ValidationError};

/// Login, registration and logout against the remote service.
#[derive(Clone)]
pub struct AccountService {
    auth: Arc<dyn AuthApi>,
}

impl AccountService {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthApi>) -> Self {
        Self { auth }
    }

    /// Log in and keep the returned access token for later calls.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a blank email or password and
    /// `ServiceError::Api` when the service rejects the credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let email = non_blank(email, ValidationError::EmptyEmail)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }
        let session = self.auth.login(email, password).await?;
        tracing::info!(username = session.username.as_deref().unwrap_or(""), "logged in");
        Ok(session)
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for blank fields and
    /// `ServiceError::Api` when the service refuses the registration.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ServiceError> {
        let email = non_blank(email, ValidationError::EmptyEmail)?;
        let username = non_blank(username, ValidationError::EmptyUsername)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }
        self.auth.register(email, username, password).await?;
        tracing::info!(%username, "registered");
        Ok(())
    }

    pub fn logout(&self) {
        self.auth.logout();
        tracing::info!("logged out");
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }
}

fn non_blank(value: &str, err: ValidationError) -> Result<&str, ValidationError> {
    let value = value.trim();
    if value.is_empty() { Err(err) } else { Ok(value) }
}
