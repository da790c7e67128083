//! # Inbound Webhook Endpoint
//!
//! Provider-agnostic handling of the two inbound calls a provider makes:
//!
//! - **Handshake** (`GET`): the provider proves the callback URL is ours by
//!   sending a challenge token in a query parameter. Answered by the
//!   challenge verifier; nothing is dispatched.
//! - **Delivery** (`POST`): optional payload signature check, JSON parse,
//!   registry lookup, then the event dispatcher.
//!
//! Parameter and header names come from the provider's [`InboundSpec`].
//! Secrets are resolved through the credential boundary for each call and
//! never logged.

use crate::dispatch::{AcceptedEvent, EventDispatcher};
use crate::providers::{InboundSpec, ProviderDefinition};
use crate::registry::{StoreError, Subscription, SubscriptionStore};
use crate::IntegrationId;
use hookbridge_sdk::webhook::{
    verify_challenge, verify_token_matches, ChallengeResponse, PayloadVerifier,
};
use hookbridge_sdk::{Credential, CredentialError, CredentialProvider, SecretRef};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Errors raised while answering an inbound call.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("Provider '{provider}' does not send inbound calls")]
    Unsupported { provider: String },

    #[error("Provider '{provider}' does not perform a handshake")]
    HandshakeUnsupported { provider: String },

    #[error("Handshake is missing the '{param}' parameter")]
    MissingChallenge { param: String },

    #[error("Inbound call rejected: {reason}")]
    Unauthorized { reason: String },

    #[error("Delivery body is not valid JSON: {message}")]
    MalformedPayload { message: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Handshake could not be answered: {0}")]
    Verification(#[from] hookbridge_sdk::ValidationError),
}

impl InboundError {
    /// Whether the caller sent something wrong, as opposed to a local failure.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::HandshakeUnsupported { .. }
                | Self::MissingChallenge { .. }
                | Self::Unauthorized { .. }
                | Self::MalformedPayload { .. }
                | Self::Verification(hookbridge_sdk::ValidationError::Required { .. })
        )
    }
}

/// Inbound handling for one integration.
#[derive(Clone)]
pub struct WebhookEndpoint {
    integration: IntegrationId,
    provider_name: String,
    inbound: InboundSpec,
    dispatcher: EventDispatcher,
    verifier: Option<PayloadVerifier>,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookEndpoint {
    /// Build the endpoint for an integration of `provider`.
    ///
    /// # Errors
    ///
    /// [`InboundError::Unsupported`] when the provider declares no inbound
    /// handling.
    pub fn new(
        integration: IntegrationId,
        provider: &ProviderDefinition,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Result<Self, InboundError> {
        let inbound = provider
            .inbound
            .clone()
            .ok_or_else(|| InboundError::Unsupported {
                provider: provider.name.clone(),
            })?;

        Ok(Self {
            integration,
            provider_name: provider.name.clone(),
            dispatcher: EventDispatcher::new(inbound.tag.clone()),
            verifier: inbound.signature.clone().map(PayloadVerifier::new),
            inbound,
            credentials,
            store,
        })
    }

    pub fn integration(&self) -> &IntegrationId {
        &self.integration
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Header carrying the delivery signature, if deliveries are signed.
    pub fn signature_header(&self) -> Option<&str> {
        self.verifier.as_ref().map(|v| v.scheme().header.as_str())
    }

    /// Query parameter carrying the handshake token, if there is a handshake.
    pub fn challenge_param(&self) -> Option<&str> {
        self.inbound
            .challenge
            .as_ref()
            .map(|c| c.token_param.as_str())
    }

    /// Answer a handshake.
    ///
    /// The verify token, when the provider sends one, must equal the
    /// configured secret. Signed handshakes use the registry record's
    /// verification secret, falling back to the provider's default.
    #[instrument(skip(self, query), fields(integration_id = %self.integration, provider = %self.provider_name))]
    pub async fn handshake(
        &self,
        query: &HashMap<String, String>,
    ) -> Result<ChallengeResponse, InboundError> {
        let challenge =
            self.inbound
                .challenge
                .as_ref()
                .ok_or_else(|| InboundError::HandshakeUnsupported {
                    provider: self.provider_name.clone(),
                })?;

        let token = query
            .get(&challenge.token_param)
            .ok_or_else(|| InboundError::MissingChallenge {
                param: challenge.token_param.clone(),
            })?;

        let needs_credential =
            challenge.verify_token.is_some() || challenge.response.requires_secret();
        let credential = match needs_credential {
            true => Some(self.credentials.credential(self.integration.as_str()).await?),
            false => None,
        };

        if let (Some(spec), Some(credential)) = (&challenge.verify_token, &credential) {
            let expected = self.secret(credential, &SecretRef::new(spec.secret.clone()))?;
            let presented = query.get(&spec.param).map(String::as_str);
            if !verify_token_matches(&expected, presented) {
                warn!(param = %spec.param, "Handshake verify token mismatch");
                return Err(InboundError::Unauthorized {
                    reason: "verify token mismatch".to_string(),
                });
            }
        }

        let secret = match (&credential, challenge.response.requires_secret()) {
            (Some(credential), true) => {
                let record = self.store.get(&self.integration).await?;
                let name = record
                    .and_then(|r| r.verification_secret)
                    .or_else(|| challenge.secret.clone().map(SecretRef::new));
                match name {
                    Some(name) => Some(self.secret(credential, &name)?),
                    None => None,
                }
            }
            _ => None,
        };

        let response = verify_challenge(token, secret.as_deref(), &challenge.response)?;
        info!("Answered provider handshake");
        Ok(response)
    }

    /// Verify and filter a delivery.
    ///
    /// Returns the accepted events; an empty list means the delivery was
    /// authentic but not of interest.
    #[instrument(skip(self, signature, body), fields(integration_id = %self.integration, provider = %self.provider_name, body_len = body.len()))]
    pub async fn deliver(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<Vec<AcceptedEvent>, InboundError> {
        let record = self.store.get(&self.integration).await?;

        if let Some(verifier) = &self.verifier {
            self.check_signature(verifier, record.as_ref(), signature, body)
                .await?;
        }

        let payload: Value =
            serde_json::from_slice(body).map_err(|e| InboundError::MalformedPayload {
                message: e.to_string(),
            })?;

        let accepted = self.dispatcher.dispatch(&payload, record.as_ref());
        if accepted.is_empty() {
            debug!("Delivery carried no enabled event");
        } else {
            info!(accepted = accepted.len(), "Accepted delivery");
        }
        Ok(accepted)
    }

    async fn check_signature(
        &self,
        verifier: &PayloadVerifier,
        record: Option<&Subscription>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), InboundError> {
        let header = &verifier.scheme().header;
        let signature = signature.ok_or_else(|| {
            warn!(header = %header, "Delivery without signature");
            InboundError::Unauthorized {
                reason: format!("missing {} header", header),
            }
        })?;

        let name = record
            .and_then(|r| r.verification_secret.clone())
            .unwrap_or_else(|| SecretRef::new(verifier.scheme().secret.clone()));
        let credential = self.credentials.credential(self.integration.as_str()).await?;
        let secret = self.secret(&credential, &name)?;

        match verifier.verify(body, signature, &secret) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(header = %header, "Delivery signature mismatch");
                Err(InboundError::Unauthorized {
                    reason: "signature mismatch".to_string(),
                })
            }
            Err(e) => {
                warn!(header = %header, error = %e, "Malformed delivery signature");
                Err(InboundError::Unauthorized {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn secret(&self, credential: &Credential, name: &SecretRef) -> Result<String, InboundError> {
        credential
            .resolve(name)
            .map(|s| s.expose_secret().to_string())
            .ok_or_else(|| {
                InboundError::Credential(CredentialError::MissingEntry {
                    integration: self.integration.to_string(),
                    name: name.as_str().to_string(),
                })
            })
    }
}

impl fmt::Debug for WebhookEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookEndpoint")
            .field("integration", &self.integration)
            .field("provider", &self.provider_name)
            .field("challenge_param", &self.challenge_param())
            .field("signature_header", &self.signature_header())
            .finish()
    }
}

#[cfg(test)]
#[path = "inbound_tests.rs"]
mod tests;
