//! `jobhub-onboarding` — OTP-gated account onboarding.
//!
//! Two tightly-related pieces of state-machine logic live here:
//! - the OTP challenge engine (issue / resend / verify with rate limiting and
//!   an atomic verify transition), and
//! - the account onboarding orchestration on top of it (signup, signup
//!   confirmation, login).
//!
//! All state that crosses a request boundary lives behind the [`OtpStore`] and
//! [`UserStore`] traits; the engines themselves are stateless and clock-free
//! (callers pass `now`).

pub mod email;
pub mod error;
pub mod otp;
pub mod signup;
pub mod store;
pub mod types;

pub use email::{ConsoleEmailSender, EmailError, EmailSender, MemoryEmailSender, SentEmail};
pub use error::{FieldError, OnboardingError};
pub use otp::{IssuedChallenge, OtpConfig, OtpEngine};
pub use signup::{AccountOnboarding, OnboardingConfig, SignupOutcome};
pub use store::{
    InMemoryOtpStore, InMemoryUserStore, OtpStore, OtpStoreError, UserStore, UserStoreError,
};
pub use types::{ChallengeId, OtpChallenge, OtpStatus, UserRecord};
