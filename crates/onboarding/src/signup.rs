//! Signup / confirmation / login orchestration.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use jobhub_auth::{PasswordHasher, SessionClaims, TokenSigner};
use jobhub_core::UserId;

use crate::email::EmailSender;
use crate::error::{FieldError, OnboardingError};
use crate::otp::{IssuedChallenge, OtpEngine};
use crate::store::{OtpStore, UserStore, UserStoreError};
use crate::types::{ChallengeId, UserRecord, normalize_email};

/// Orchestration policy knobs.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Lifetime of issued session tokens.
    pub token_lifetime: Duration,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            token_lifetime: Duration::minutes(60),
        }
    }
}

/// Outcome of a signup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupOutcome {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub expires_at: DateTime<Utc>,
    /// True when an existing unverified user got a code resent instead of a
    /// fresh account being created.
    pub resent: bool,
}

/// Orchestrates signup, OTP confirmation, and login.
///
/// Partial progress is never rolled back: a user created whose code could not
/// be delivered stays on record as unverified and is recovered by a later
/// signup call (which takes the resend path).
pub struct AccountOnboarding<U: UserStore, S: OtpStore, M: EmailSender> {
    users: U,
    otp: OtpEngine<S, M>,
    hasher: Arc<dyn PasswordHasher>,
    signer: Arc<dyn TokenSigner>,
    config: OnboardingConfig,
}

impl<U: UserStore, S: OtpStore, M: EmailSender> AccountOnboarding<U, S, M> {
    pub fn new(
        users: U,
        otp: OtpEngine<S, M>,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<dyn TokenSigner>,
        config: OnboardingConfig,
    ) -> Self {
        Self {
            users,
            otp,
            hasher,
            signer,
            config,
        }
    }

    /// Create-or-reuse a user and get a verification code on its way.
    pub fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome, OnboardingError> {
        validate_signup(email, password, name)?;
        let email = normalize_email(email);

        match self.users.find_by_email(&email)? {
            Some(user) if user.email_verified => {
                debug!(%email, "signup against verified email rejected");
                Err(OnboardingError::EmailInUse)
            }
            Some(user) => {
                // Existing unverified account: re-run the hourly budget, then
                // resend (or re-issue, if the old code has lapsed).
                self.otp.check_hourly_budget(user.id, now)?;
                let issued = self.otp.resend(user.id, &user.email, now)?;
                Ok(outcome(user.id, issued, true))
            }
            None => {
                let password_hash = self.hasher.hash(password)?;
                let user =
                    UserRecord::new(email.clone(), name.trim().to_string(), password_hash, now);
                let user_id = user.id;

                match self.users.create(user) {
                    Ok(()) => {}
                    // Lost a create race; the surviving record owns the email.
                    Err(UserStoreError::DuplicateEmail) => {
                        return Err(OnboardingError::EmailInUse);
                    }
                    Err(e) => return Err(e.into()),
                }

                info!(%user_id, "user created (unverified)");
                let issued = self.otp.issue(user_id, &email, now)?;
                Ok(outcome(user_id, issued, false))
            }
        }
    }

    /// Verify the code, promote the user to verified, and issue a session
    /// token.
    pub fn confirm_signup(
        &self,
        challenge_id: ChallengeId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<String, OnboardingError> {
        let user_id = self.otp.verify(challenge_id, code, now)?;

        // Idempotent: setting verified on an already-verified user is
        // harmless.
        self.users.mark_verified(user_id)?;
        info!(%user_id, "user verified");

        self.issue_token(user_id, now)
    }

    /// Password login. The error is uniform whether the email is unknown or
    /// the password mismatches.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<String, OnboardingError> {
        let email = normalize_email(email);

        let user = self
            .users
            .find_by_email(&email)?
            .ok_or(OnboardingError::WrongCredentials)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(OnboardingError::WrongCredentials);
        }

        debug!(user_id = %user.id, "login succeeded");
        self.issue_token(user.id, now)
    }

    fn issue_token(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, OnboardingError> {
        let claims = SessionClaims::for_user(user_id, now, self.config.token_lifetime);
        Ok(self.signer.sign(&claims)?)
    }
}

fn outcome(user_id: UserId, issued: IssuedChallenge, resent: bool) -> SignupOutcome {
    SignupOutcome {
        user_id,
        challenge_id: issued.challenge_id,
        expires_at: issued.expires_at,
        resent,
    }
}

fn validate_signup(email: &str, password: &str, name: &str) -> Result<(), OnboardingError> {
    let mut errors = Vec::new();

    if !is_plausible_email(email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
    if password.chars().count() < 8 {
        errors.push(FieldError::new("password", "must be at least 8 characters"));
    }
    if name.trim().chars().count() < 3 {
        errors.push(FieldError::new("name", "must be at least 3 characters"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(OnboardingError::Validation(errors))
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MemoryEmailSender;
    use crate::otp::OtpConfig;
    use crate::store::{InMemoryOtpStore, InMemoryUserStore};
    use jobhub_auth::{BcryptPasswordHasher, Hs256TokenSigner, TokenSigner};

    type TestOnboarding =
        AccountOnboarding<Arc<InMemoryUserStore>, Arc<InMemoryOtpStore>, Arc<MemoryEmailSender>>;

    struct Fixture {
        onboarding: TestOnboarding,
        users: Arc<InMemoryUserStore>,
        mailer: Arc<MemoryEmailSender>,
        signer: Arc<Hs256TokenSigner>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserStore::new());
        let otp_store = Arc::new(InMemoryOtpStore::new());
        let mailer = Arc::new(MemoryEmailSender::new());
        let signer = Arc::new(Hs256TokenSigner::new("test-secret"));

        let onboarding = AccountOnboarding::new(
            users.clone(),
            OtpEngine::new(otp_store, mailer.clone(), OtpConfig::default()),
            Arc::new(BcryptPasswordHasher::with_cost(4)),
            signer.clone(),
            OnboardingConfig::default(),
        );

        Fixture {
            onboarding,
            users,
            mailer,
            signer,
        }
    }

    fn last_code(mailer: &MemoryEmailSender) -> String {
        let mail = mailer.last().unwrap();
        mail.html
            .split("<b>")
            .nth(1)
            .and_then(|s| s.split("</b>").next())
            .unwrap()
            .to_string()
    }

    #[test]
    fn signup_creates_unverified_user_and_sends_code() {
        let fx = fixture();
        let now = Utc::now();

        let out = fx
            .onboarding
            .signup(" A@X.Com ", "pw12345678", "Ann", now)
            .unwrap();

        assert!(!out.resent);
        assert_eq!(out.expires_at, now + Duration::minutes(5));

        let user = fx.users.find_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(user.id, out.user_id);
        assert!(!user.email_verified);
        assert_ne!(user.password_hash, "pw12345678");

        assert_eq!(fx.mailer.sent().len(), 1);
        assert_eq!(fx.mailer.last().unwrap().to, "a@x.com");
    }

    #[test]
    fn signup_rejects_bad_input_with_field_detail() {
        let fx = fixture();
        let err = fx
            .onboarding
            .signup("not-an-email", "short", "x", Utc::now())
            .unwrap_err();

        let OnboardingError::Validation(fields) = err else {
            panic!("expected validation error, got {err:?}");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field).collect();
        assert_eq!(names, vec!["email", "password", "name"]);
    }

    #[test]
    fn signup_against_verified_email_fails() {
        let fx = fixture();
        let now = Utc::now();

        let out = fx
            .onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();
        let code = last_code(&fx.mailer);
        fx.onboarding
            .confirm_signup(out.challenge_id, &code, now)
            .unwrap();

        assert!(matches!(
            fx.onboarding.signup("a@x.com", "pw12345678", "Ann", now),
            Err(OnboardingError::EmailInUse)
        ));
    }

    #[test]
    fn signup_for_unverified_user_resends() {
        let fx = fixture();
        let now = Utc::now();

        let first = fx
            .onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();
        let second = fx
            .onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();

        assert!(second.resent);
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(second.challenge_id, first.challenge_id);
        assert_eq!(fx.mailer.sent().len(), 2);
    }

    #[test]
    fn confirm_marks_verified_and_returns_session_token() {
        let fx = fixture();
        let now = Utc::now();

        let out = fx
            .onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();
        let code = last_code(&fx.mailer);

        let token = fx
            .onboarding
            .confirm_signup(out.challenge_id, &code, now)
            .unwrap();

        let user = fx.users.find_by_id(out.user_id).unwrap().unwrap();
        assert!(user.email_verified);

        let claims = fx.signer.verify(&token, now).unwrap();
        assert_eq!(claims.sub, out.user_id);
    }

    #[test]
    fn confirm_with_wrong_code_fails() {
        let fx = fixture();
        let now = Utc::now();

        let out = fx
            .onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();
        let code = last_code(&fx.mailer);
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert!(matches!(
            fx.onboarding.confirm_signup(out.challenge_id, wrong, now),
            Err(OnboardingError::InvalidOrExpiredCode)
        ));
        assert!(!fx.users.find_by_id(out.user_id).unwrap().unwrap().email_verified);
    }

    #[test]
    fn login_is_uniform_for_unknown_email_and_wrong_password() {
        let fx = fixture();
        let now = Utc::now();

        fx.onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();

        let unknown = fx.onboarding.login("b@x.com", "pw12345678", now).unwrap_err();
        let wrong_pw = fx.onboarding.login("a@x.com", "wrong-password", now).unwrap_err();

        assert!(matches!(unknown, OnboardingError::WrongCredentials));
        assert!(matches!(wrong_pw, OnboardingError::WrongCredentials));
    }

    #[test]
    fn login_returns_verifiable_token() {
        let fx = fixture();
        let now = Utc::now();

        let out = fx
            .onboarding
            .signup("a@x.com", "pw12345678", "Ann", now)
            .unwrap();

        let token = fx.onboarding.login("A@X.COM", "pw12345678", now).unwrap();
        let claims = fx.signer.verify(&token, now).unwrap();
        assert_eq!(claims.sub, out.user_id);
    }
}
