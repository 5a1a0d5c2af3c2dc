//! Authentication service
//!
//! Orchestrates registration, login (behind the abuse gate), refresh-token
//! rotation with replay escalation, and logout. Storage errors on these paths
//! always propagate and reject the request - the session store is
//! security-critical, so it fails closed (the abuse gate is the one
//! deliberate exception, see `abuse.rs`).

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use gate_common::{
    hash_password, validate_password_strength, verify_password, AccessClaims, AppError,
    TokenManager,
};
use gate_core::entities::{Session, User};
use gate_core::value_objects::{device_hash, ip_cidr};

use crate::dto::{
    AuthResponse, ClientInfo, CurrentUserResponse, LoginRequest, RefreshTokenRequest,
    RegisterRequest, SessionResponse,
};

use super::abuse::AbuseControlService;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Authentication service
pub struct AuthService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a new user
    #[instrument(skip(self, request, client), fields(email = %request.email))]
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> ServiceResult<AuthResponse> {
        validate_password_strength(&request.password).map_err(ServiceError::from)?;

        let email = User::normalize_email(&request.email);
        if self.ctx.user_repo().email_exists(&email).await? {
            return Err(ServiceError::conflict("Email already registered"));
        }

        let password_hash =
            hash_password(&request.password).map_err(|e| ServiceError::internal(e.to_string()))?;

        let mut user = User::new(Uuid::new_v4(), email);
        user.display_name = request.display_name;
        self.ctx
            .user_repo()
            .create(&user, Some(&password_hash))
            .await?;

        info!(user_id = %user.id, "User registered successfully");

        self.issue_session(&user, request.remember_me, client).await
    }

    /// Login with email and password, gated by abuse control
    #[instrument(skip(self, request, client), fields(email = %request.email))]
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> ServiceResult<AuthResponse> {
        let email = User::normalize_email(&request.email);
        let abuse = AbuseControlService::new(self.ctx);

        // Gate first: blocked identifiers never reach the credential check.
        let gate = abuse.check_login_abuse(&email).await?;
        if !gate.allowed {
            return Err(ServiceError::App(AppError::RateLimited {
                retry_after_seconds: gate.backoff_seconds,
            }));
        }
        if gate.requires_captcha {
            abuse
                .verify_captcha(request.captcha_token.as_deref(), Some(&client.ip))
                .await?;
        }

        // Unknown email and wrong password take the same failure path so the
        // response does not confirm account existence.
        let user = match self.ctx.user_repo().find_by_email(&email).await? {
            Some(user) => user,
            None => {
                warn!("Login failed: user not found");
                abuse.record_failed_login(&email, &client.ip).await?;
                return Err(ServiceError::App(AppError::InvalidCredentials));
            }
        };

        let password_hash = match self.ctx.user_repo().get_password_hash(user.id).await? {
            Some(hash) => hash,
            None => {
                warn!(user_id = %user.id, "Login failed: passwordless account");
                abuse.record_failed_login(&email, &client.ip).await?;
                return Err(ServiceError::App(AppError::InvalidCredentials));
            }
        };

        let is_valid = verify_password(&request.password, &password_hash)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        if !is_valid {
            warn!(user_id = %user.id, "Login failed: invalid password");
            abuse.record_failed_login(&email, &client.ip).await?;
            return Err(ServiceError::App(AppError::InvalidCredentials));
        }

        abuse.record_successful_login(&email, &client.ip).await?;
        info!(user_id = %user.id, "User logged in successfully");

        self.issue_session(&user, request.remember_me, client).await
    }

    /// Rotate a refresh token and mint a new token pair.
    ///
    /// Zero rows matching the guarded rotation is never treated as a plain
    /// not-found: it triggers the replay check, and a confirmed replay
    /// revokes the entire session family before the caller sees a generic
    /// invalid-token failure.
    #[instrument(skip(self, request))]
    pub async fn refresh_tokens(&self, request: RefreshTokenRequest) -> ServiceResult<AuthResponse> {
        let claims = self
            .ctx
            .token_manager()
            .verify_refresh_token(&request.refresh_token)
            .ok_or(ServiceError::App(AppError::InvalidToken))?;
        let user_id = claims.user_uuid().map_err(ServiceError::from)?;

        let session = match self.ctx.session_repo().find_by_current_jti(&claims.jti).await? {
            Some(session) => session,
            None => {
                // Not current anywhere: either garbage or a rotated-away
                // token being replayed.
                self.handle_token_replay(&claims.jti).await?;
                return Err(ServiceError::App(AppError::InvalidToken));
            }
        };

        if session.user_id != user_id || !session.is_active(Utc::now()) {
            return Err(ServiceError::App(AppError::InvalidToken));
        }

        // Preserve the remember-me window the family was minted with.
        let remember_me =
            (claims.exp - claims.iat) > self.ctx.config().jwt.refresh_token_ttl;
        let new_refresh = self
            .ctx
            .token_manager()
            .mint_refresh_token(user_id, remember_me)
            .map_err(ServiceError::from)?;
        let new_expiry = Utc::now() + Duration::seconds(new_refresh.ttl_seconds);

        let rotated = self
            .ctx
            .session_repo()
            .rotate_token(session.family_id, &claims.jti, &new_refresh.jti, new_expiry)
            .await?;
        if !rotated {
            // Lost a race against a concurrent refresh of the same token, or
            // the family died in between. Both smell like replay.
            self.handle_token_replay(&claims.jti).await?;
            return Err(ServiceError::App(AppError::InvalidToken));
        }

        let user = self
            .ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id.to_string()))?;

        let access = self
            .ctx
            .token_manager()
            .mint_access_token(user.id, &user.email, &user.roles)
            .map_err(ServiceError::from)?;

        info!(user_id = %user.id, family_id = %session.family_id, "Tokens refreshed");

        Ok(AuthResponse::new(
            access.token,
            new_refresh.token,
            access.ttl_seconds,
            CurrentUserResponse::from(&user),
        ))
    }

    /// Check whether `jti` was already rotated away and, if so, revoke its
    /// whole family and emit a security audit event. The detection result is
    /// internal; callers surface a generic invalid-token failure either way.
    async fn handle_token_replay(&self, jti: &str) -> ServiceResult<bool> {
        let Some(row) = self.ctx.session_repo().find_by_reused_jti(jti).await? else {
            return Ok(false);
        };

        let revoked = self
            .ctx
            .session_repo()
            .revoke_family(row.family_id, "refresh token replay")
            .await?;
        warn!(
            target: "security",
            family_id = %row.family_id,
            user_id = %row.user_id,
            sessions_revoked = revoked,
            "Refresh token replay detected; session family revoked"
        );
        Ok(true)
    }

    /// Logout: revoke the family selected by the refresh token, or every
    /// active session of the user when no token is supplied. Idempotent.
    #[instrument(skip(self, refresh_token))]
    pub async fn logout(
        &self,
        user_id: Uuid,
        refresh_token: Option<String>,
    ) -> ServiceResult<()> {
        match refresh_token {
            Some(token) => {
                // The token may already be expired; extraction is enough
                // because ownership is checked against the session row.
                let jti = TokenManager::extract_jti(&token)
                    .ok_or(ServiceError::App(AppError::InvalidToken))?;
                let session = self
                    .ctx
                    .session_repo()
                    .find_by_current_jti(&jti)
                    .await?
                    .filter(|s| s.user_id == user_id)
                    .ok_or(ServiceError::App(AppError::InvalidToken))?;
                self.ctx
                    .session_repo()
                    .revoke_family(session.family_id, "logout")
                    .await?;
            }
            None => {
                let sessions = self.ctx.session_repo().find_active_for_user(user_id).await?;
                let mut families: Vec<Uuid> = sessions.iter().map(|s| s.family_id).collect();
                families.sort_unstable();
                families.dedup();
                for family_id in families {
                    self.ctx
                        .session_repo()
                        .revoke_family(family_id, "logout all devices")
                        .await?;
                }
            }
        }

        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Active sessions for the account-security page
    #[instrument(skip(self))]
    pub async fn list_sessions(&self, user_id: Uuid) -> ServiceResult<Vec<SessionResponse>> {
        let sessions = self.ctx.session_repo().find_active_for_user(user_id).await?;
        Ok(sessions.iter().map(SessionResponse::from).collect())
    }

    /// Externally triggered sweep of expired/revoked session rows
    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> ServiceResult<u64> {
        let retention = Duration::days(self.ctx.config().session.cleanup_retention_days);
        let removed = self.ctx.session_repo().cleanup_expired(retention).await?;
        Ok(removed)
    }

    /// Validate an access token and return its claims
    pub fn validate_token(&self, token: &str) -> ServiceResult<AccessClaims> {
        self.ctx
            .token_manager()
            .verify_access_token(token)
            .ok_or(ServiceError::App(AppError::InvalidToken))
    }

    /// Get the user for a validated access token
    #[instrument(skip(self, token))]
    pub async fn get_user_from_token(&self, token: &str) -> ServiceResult<User> {
        let claims = self.validate_token(token)?;
        let user_id = claims.user_id().map_err(ServiceError::from)?;

        self.ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id.to_string()))
    }

    /// Mint a token pair and persist the session row backing it. Also used by
    /// the magic-link service after a successful consumption (a strong
    /// authentication, so it starts a fresh family).
    pub(crate) async fn issue_session(
        &self,
        user: &User,
        remember_me: bool,
        client: &ClientInfo,
    ) -> ServiceResult<AuthResponse> {
        let refresh = self
            .ctx
            .token_manager()
            .mint_refresh_token(user.id, remember_me)
            .map_err(ServiceError::from)?;
        let access = self
            .ctx
            .token_manager()
            .mint_access_token(user.id, &user.email, &user.roles)
            .map_err(ServiceError::from)?;

        let session = Session::new(
            user.id,
            refresh.jti.clone(),
            device_hash(&client.user_agent),
            ip_cidr(&client.ip),
            Utc::now() + Duration::seconds(refresh.ttl_seconds),
        );
        self.ctx.session_repo().create(&session).await?;

        Ok(AuthResponse::new(
            access.token,
            refresh.token,
            access.ttl_seconds,
            CurrentUserResponse::from(user),
        ))
    }
}
