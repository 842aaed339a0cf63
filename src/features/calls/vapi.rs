//! # Feature: Voice Calls
//!
//! Places reminder calls through the Vapi phone-call API. A fixed assistant
//! greets the callee, speaks the reminder message, and says goodbye.
//! Without a private key the dispatcher runs in mock mode and reports
//! [`MOCK_CALL_ID`] without contacting the API.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Bounded request timeout, blank call ids treated as failures
//! - 1.1.0: Mock mode when `VAPI_PRIVATE_KEY` is unset
//! - 1.0.0: Initial release with Vapi integration

use super::dispatcher::{CallDispatcher, CallOutcome, CallRequest, MOCK_CALL_ID};
use crate::core::Config;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ASSISTANT_PROVIDER: &str = "openai";
const ASSISTANT_MODEL: &str = "gpt-3.5-turbo";
const ASSISTANT_VOICE: &str = "jennifer-playht";
const ASSISTANT_SYSTEM_PROMPT: &str = "You are a helpful reminder assistant. You call people to deliver a message and then say goodbye.";

/// Body of `POST /call/phone`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    pub phone_number_id: String,
    pub customer: Customer,
    pub assistant: Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    pub first_message: String,
    pub model: AssistantModel,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantModel {
    pub provider: String,
    pub model: String,
    pub messages: Vec<AssistantMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Opening line spoken when the callee picks up
pub fn first_message(message: &str) -> String {
    format!("Hello! This is your reminder: {message}")
}

#[derive(Clone)]
pub struct VapiDispatcher {
    client: reqwest::Client,
    api_url: String,
    private_key: Option<String>,
    phone_number_id: Option<String>,
    timeout: Duration,
}

impl VapiDispatcher {
    pub fn new(
        api_url: &str,
        private_key: Option<String>,
        phone_number_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(VapiDispatcher {
            client,
            api_url: api_url.to_string(),
            private_key: private_key.filter(|k| !k.trim().is_empty()),
            phone_number_id: phone_number_id.filter(|id| !id.trim().is_empty()),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.vapi_api_url,
            config.vapi_private_key.clone(),
            config.vapi_phone_number_id.clone(),
            config.call_timeout,
        )
    }

    /// Whether calls are simulated instead of placed
    pub fn is_mock(&self) -> bool {
        self.private_key.is_none()
    }

    /// Build the request body for a call
    pub fn build_payload(&self, request: &CallRequest) -> Result<CallPayload> {
        let phone_number_id = self
            .phone_number_id
            .clone()
            .ok_or_else(|| anyhow!("VAPI_PHONE_NUMBER_ID is not configured"))?;

        if request.phone_number.trim().is_empty() {
            return Err(anyhow!("Destination phone number is empty"));
        }

        Ok(CallPayload {
            phone_number_id,
            customer: Customer {
                number: request.phone_number.trim().to_string(),
            },
            assistant: Assistant {
                first_message: first_message(&request.message),
                model: AssistantModel {
                    provider: ASSISTANT_PROVIDER.to_string(),
                    model: ASSISTANT_MODEL.to_string(),
                    messages: vec![AssistantMessage {
                        role: "system".to_string(),
                        content: ASSISTANT_SYSTEM_PROMPT.to_string(),
                    }],
                },
                voice: ASSISTANT_VOICE.to_string(),
            },
        })
    }

    /// Send one call request and return the provider's call id
    async fn place_call(&self, private_key: &str, request: &CallRequest) -> Result<String> {
        let payload = self.build_payload(request)?;

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(private_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request timed out after {:?}", self.timeout)
                } else if e.is_connect() {
                    anyhow!("Could not connect to the voice API")
                } else {
                    anyhow!("HTTP request failed: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Voice API returned HTTP {status}: {body}"));
        }

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read voice API response: {e}"))?;
        let parsed: CallResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Unexpected response format: {e}"))?;

        match parsed.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                debug!(
                    "Voice API accepted call {id} with status {}",
                    parsed.status.as_deref().unwrap_or("unknown")
                );
                Ok(id)
            }
            None => Err(anyhow!("Voice API response has no call id")),
        }
    }
}

#[async_trait]
impl CallDispatcher for VapiDispatcher {
    async fn dispatch(&self, request: &CallRequest) -> CallOutcome {
        let Some(private_key) = self.private_key.as_deref() else {
            warn!(
                "VAPI_PRIVATE_KEY not set. Simulating call for reminder {} ({MOCK_CALL_ID})",
                request.reminder_id
            );
            return CallOutcome::Simulated;
        };

        match self.place_call(private_key, request).await {
            Ok(call_id) => {
                info!(
                    "Placed call {call_id} for reminder {}",
                    request.reminder_id
                );
                CallOutcome::Placed { call_id }
            }
            Err(e) => {
                error!(
                    "Error triggering call for reminder {}: {e}",
                    request.reminder_id
                );
                CallOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
