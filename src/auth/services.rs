use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::{
    error::AuthError,
    jwt::TokenIssuer,
    password::PasswordEncoder,
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::config::PasswordPolicy;

const NAME_MAX_LEN: usize = 50;
const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Invalid email.".into()));
    }
    Ok(())
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<(), AuthError> {
        let len = password.chars().count();
        if len < self.min_len {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters.",
                self.min_len
            )));
        }
        if len > self.max_len {
            return Err(AuthError::Validation(format!(
                "Password must be at most {} characters.",
                self.max_len
            )));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::Validation(
                "Password must contain a number.".into(),
            ));
        }
        if self.require_special && !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
            return Err(AuthError::Validation(
                "Password must contain a special character.".into(),
            ));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), AuthError> {
    if name.is_empty() {
        return Err(AuthError::Validation("Name is required.".into()));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(AuthError::Validation(format!(
            "Name must be at most {NAME_MAX_LEN} characters."
        )));
    }
    Ok(())
}

/// Signup, login, lookup and password change over a [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    encoder: Arc<dyn PasswordEncoder>,
    tokens: Arc<dyn TokenIssuer>,
    policy: PasswordPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        encoder: Arc<dyn PasswordEncoder>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            users,
            encoder,
            tokens,
            policy: PasswordPolicy::default(),
        }
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    // Argon2 is CPU-bound; keep it off the async workers.
    async fn encode(&self, plain: &str) -> Result<String, AuthError> {
        let encoder = self.encoder.clone();
        let plain = plain.to_owned();
        let hash = tokio::task::spawn_blocking(move || encoder.encode(&plain))
            .await
            .context("password hash task")??;
        Ok(hash)
    }

    async fn matches(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        let encoder = self.encoder.clone();
        let (plain, hash) = (plain.to_owned(), hash.to_owned());
        let ok = tokio::task::spawn_blocking(move || encoder.matches(&plain, &hash))
            .await
            .context("password verify task")??;
        Ok(ok)
    }

    #[instrument(skip(self, password, name))]
    pub async fn signup(&self, email: &str, password: &str, name: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;

        if self.users.exists_by_email(&email).await? {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let name = name.trim();
        self.policy.check(password)?;
        validate_name(name)?;

        let password_hash = self.encode(password).await?;
        // A racing signup that passed the check above is rejected by the store.
        let user = self
            .users
            .insert(NewUser {
                email,
                password_hash,
                name: name.to_string(),
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Returns a bearer token bound to the email and the matching user.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User), AuthError> {
        let email = normalize_email(email);
        let user = self.users.find_by_email(&email).await?.ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            AuthError::UnknownUser
        })?;

        if !self.matches(password, &user.password_hash).await? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.create_token(&user.email)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok((token, user))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, email: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        self.users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UnknownUser)
    }

    #[instrument(skip(self))]
    pub async fn is_email_available(&self, email: &str) -> Result<bool, AuthError> {
        let email = normalize_email(email);
        Ok(!self.users.exists_by_email(&email).await?)
    }

    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.get_user(email).await?;

        if !self.matches(current_password, &user.password_hash).await? {
            warn!(user_id = %user.id, "change_password current password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        self.policy.check(new_password)?;

        let new_hash = self.encode(new_password).await?;
        let updated = self
            .users
            .update_password_hash(user.id, &user.password_hash, &new_hash)
            .await?;
        if !updated {
            // The hash we verified against was replaced concurrently.
            warn!(user_id = %user.id, "change_password lost race");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "password changed");
        Ok(())
    }
}
