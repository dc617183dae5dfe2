//! Twilio REST client for WhatsApp

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tracing::{debug, info};

use bt_core::TwilioConfig;

use crate::error::{Result, WhatsAppError};

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Anything able to deliver an outbound WhatsApp message
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `body` to `to`, returning the provider message id
    async fn send_message(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<String>;
}

/// Twilio API client
#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    whatsapp_number: String,
    base_url: String,
}

/// Incoming WhatsApp message from the Twilio webhook
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: String,
    #[serde(rename = "NumMedia", default)]
    pub num_media: Option<String>,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url: Option<String>,
    #[serde(rename = "ProfileName", default)]
    pub profile_name: Option<String>,
    #[serde(rename = "WaId", default)]
    pub wa_id: Option<String>,
}

impl IncomingMessage {
    /// Media URL, only when Twilio reported attached media
    pub fn media(&self) -> Option<&str> {
        let count = self
            .num_media
            .as_deref()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(0);
        if count > 0 {
            self.media_url.as_deref().filter(|url| !url.is_empty())
        } else {
            None
        }
    }
}

/// A phone number owned by the Twilio account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingNumber {
    pub sid: String,
    pub phone_number: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub sms_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "To")]
    to: String,
    #[serde(rename = "Body")]
    body: &'a str,
    #[serde(rename = "MediaUrl", skip_serializing_if = "Option::is_none")]
    media_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdateWebhookPayload<'a> {
    #[serde(rename = "SmsUrl")]
    sms_url: &'a str,
    #[serde(rename = "SmsMethod")]
    sms_method: &'a str,
}

/// Strip the `whatsapp:` prefix from a sender address
pub fn clean_number(number: &str) -> &str {
    number.strip_prefix(WHATSAPP_PREFIX).unwrap_or(number)
}

/// Add the `whatsapp:` prefix when missing
pub fn whatsapp_address(number: &str) -> String {
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, number)
    }
}

impl TwilioClient {
    /// Create a new Twilio client
    pub fn new(account_sid: String, auth_token: String, whatsapp_number: String) -> Self {
        Self {
            client: Client::new(),
            account_sid,
            auth_token,
            whatsapp_number,
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Build a client from configuration, failing without credentials
    pub fn from_config(config: &TwilioConfig) -> Result<Self> {
        if !config.has_credentials() {
            return Err(WhatsAppError::CredentialsNotSet);
        }
        Ok(Self::new(
            config.account_sid.clone(),
            config.auth_token.clone(),
            config.whatsapp_number.clone(),
        )
        .with_base_url(&config.api_base_url))
    }

    /// Point the client at another API host (used by tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn account_url(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}",
            self.base_url, self.account_sid, resource
        )
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(WhatsAppError::Api { status, message })
    }

    /// Send a WhatsApp message, returning the message SID
    pub async fn send_message(
        &self,
        to: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<String> {
        let to = whatsapp_address(to);
        info!("Sending WhatsApp message to {}", to);

        let payload = SendMessagePayload {
            from: whatsapp_address(&self.whatsapp_number),
            to,
            body,
            media_url,
        };

        let response = self
            .client
            .post(self.account_url("Messages.json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&payload)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        #[derive(Deserialize)]
        struct SendMessageResponse {
            sid: String,
        }

        let result: SendMessageResponse = response.json().await?;
        info!("WhatsApp message sent to {}: {}", payload.to, result.sid);
        Ok(result.sid)
    }

    /// Phone numbers on the account
    pub async fn list_incoming_numbers(&self) -> Result<Vec<IncomingNumber>> {
        let response = self
            .client
            .get(self.account_url("IncomingPhoneNumbers.json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        #[derive(Deserialize)]
        struct NumberList {
            #[serde(default)]
            incoming_phone_numbers: Vec<IncomingNumber>,
        }

        let list: NumberList = response.json().await?;
        debug!("Account has {} phone numbers", list.incoming_phone_numbers.len());
        Ok(list.incoming_phone_numbers)
    }

    /// Point a number's incoming-message webhook at `url` (POST)
    pub async fn update_sms_webhook(&self, number_sid: &str, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.account_url(&format!("IncomingPhoneNumbers/{}.json", number_sid)))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&UpdateWebhookPayload {
                sms_url: url,
                sms_method: "POST",
            })
            .send()
            .await?;
        Self::check_status(response).await?;
        info!("Webhook for {} set to {}", number_sid, url);
        Ok(())
    }

    /// Verify an `X-Twilio-Signature` header for a request to `url`
    pub fn verify_signature(&self, url: &str, params: &[(String, String)], signature: &str) -> bool {
        verify_signature(&self.auth_token, url, params, signature)
    }
}

#[async_trait]
impl MessageSender for TwilioClient {
    async fn send_message(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<String> {
        TwilioClient::send_message(self, to, body, media_url).await
    }
}

type HmacSha1 = Hmac<Sha1>;

fn signature_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).ok()?;

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    mac.update(url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Some(mac)
}

/// Twilio request signature: base64 HMAC-SHA1 of the URL followed by the
/// sorted form parameters, each key immediately followed by its value
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    match signature_mac(auth_token, url, params) {
        Some(mac) => STANDARD.encode(mac.finalize().into_bytes()),
        None => String::new(),
    }
}

pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    let Ok(provided) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    match signature_mac(auth_token, url, params) {
        Some(mac) => mac.verify_slice(&provided).is_ok(),
        None => false,
    }
}
