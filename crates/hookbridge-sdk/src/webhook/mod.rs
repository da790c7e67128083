//! Inbound webhook verification.
//!
//! Two independent checks guard a provider's inbound calls:
//!
//! - [`verify_challenge`] answers the handshake a provider performs when a
//!   subscription is created or re-validated (Twitter CRC, Facebook
//!   `hub.challenge`). It is pure: no I/O, no state.
//! - [`PayloadVerifier`] checks the HMAC-SHA256 signature a provider attaches
//!   to each delivery, using constant-time comparison.
//!
//! Secrets always come from the caller, which resolves them through the
//! credential boundary. Neither check logs secret or signature values.

mod challenge;
mod validation;

pub use challenge::{
    sign_token, verify_challenge, verify_token_matches, ChallengeBody, ChallengeMode,
    ChallengeResponse, SignedDelivery,
};
pub use validation::{PayloadVerifier, SignatureEncoding, SignatureScheme};
