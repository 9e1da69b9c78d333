//! Outbound call placement
//!
//! `CallGateway` is the seam between the orchestrator and the provider; the
//! production implementation talks to the Twilio REST API, tests substitute
//! a mock.

use async_trait::async_trait;
use serde::Deserialize;

use medcall_config::ProviderConfig;

use crate::TelephonyError;

/// Places outbound call legs with the telephony provider.
#[async_trait]
pub trait CallGateway: Send + Sync {
    /// Place a call to `to`, directing the provider to fetch voice markup
    /// from `voice_url` and post status updates to `status_url`.
    ///
    /// Returns the provider's identifier for the new call leg.
    async fn place_call(
        &self,
        to: &str,
        voice_url: &str,
        status_url: &str,
    ) -> Result<String, TelephonyError>;
}

/// REST client for the Twilio calls endpoint.
pub struct TwilioGateway {
    config: ProviderConfig,
    client: reqwest::Client,
}

/// Subset of the provider's call resource we care about.
#[derive(Debug, Deserialize)]
struct CallCreated {
    sid: String,
}

impl TwilioGateway {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn calls_endpoint(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base, self.config.account_sid
        )
    }
}

#[async_trait]
impl CallGateway for TwilioGateway {
    async fn place_call(
        &self,
        to: &str,
        voice_url: &str,
        status_url: &str,
    ) -> Result<String, TelephonyError> {
        if !self.config.is_configured() {
            return Err(TelephonyError::NotConfigured);
        }

        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Url", voice_url),
            ("Method", "GET"),
            ("StatusCallback", status_url),
            ("StatusCallbackMethod", "POST"),
        ];

        let response = self
            .client
            .post(self.calls_endpoint())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "call placement rejected");
            return Err(TelephonyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let created: CallCreated = response.json().await?;
        tracing::info!(to, provider_ref = %created.sid, "outbound call placed");
        Ok(created.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_gateway_refuses_to_dial() {
        let gateway = TwilioGateway::new(ProviderConfig::default());
        let err = gateway
            .place_call("+15551234567", "https://x/voice", "https://x/status")
            .await
            .unwrap_err();
        assert!(matches!(err, TelephonyError::NotConfigured));
    }

    #[test]
    fn test_calls_endpoint_shape() {
        let config = ProviderConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550001111".to_string(),
            ..ProviderConfig::default()
        };
        let gateway = TwilioGateway::new(config);
        assert_eq!(
            gateway.calls_endpoint(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Calls.json"
        );
    }
}
