//! Telephony call-control client (Twilio REST API).
//!
//! Playback into a live call goes through the provider's call-control API,
//! not the media stream: updating the call with a new instruction document
//! interrupts whatever the call is doing, plays the referenced audio (or
//! speaks the text with the provider's built-in synthesis), and reconnects
//! the media stream to the gateway for the next turn.

use crate::config::TelephonyConfig;
use crate::error::VoiceError;
use crate::traits::CallControl;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Timeout for one call-control request.
const TELEPHONY_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

/// REST call-control client.
#[derive(Debug, Clone)]
pub struct TwilioCallControl {
    config: TelephonyConfig,
    client: reqwest::Client,
}

impl TwilioCallControl {
    pub fn new(config: TelephonyConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(TELEPHONY_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build telephony client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.endpoint, self.config.account_sid
        )
    }

    fn call_url(&self, call_id: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.config.endpoint, self.config.account_sid, call_id
        )
    }

    /// Posts an instruction document update to a live call.
    async fn update_call(&self, call_id: &str, twiml: String) -> Result<(), VoiceError> {
        let response = self
            .client
            .post(self.call_url(call_id))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("Twiml", twiml.as_str())])
            .send()
            .await
            .map_err(|e| VoiceError::Telephony(format!("call update failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoiceError::Telephony(format!(
                "call update returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Escapes text for embedding in an XML instruction document.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn play_twiml(audio_url: &str, resume_stream_url: &str) -> String {
    format!(
        r#"<Response><Play>{}</Play><Connect><Stream url="{}"/></Connect></Response>"#,
        xml_escape(audio_url),
        xml_escape(resume_stream_url),
    )
}

fn say_twiml(text: &str, resume_stream_url: Option<&str>) -> String {
    match resume_stream_url {
        Some(resume) => format!(
            r#"<Response><Say>{}</Say><Connect><Stream url="{}"/></Connect></Response>"#,
            xml_escape(text),
            xml_escape(resume),
        ),
        None => format!(r#"<Response><Say>{}</Say></Response>"#, xml_escape(text)),
    }
}

fn bridge_twiml(bridge_url: &str) -> String {
    format!(
        r#"<Response><Connect><Stream url="{}"/></Connect></Response>"#,
        xml_escape(bridge_url),
    )
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn create_call(
        &self,
        to: &str,
        status_callback_url: &str,
        bridge_url: &str,
    ) -> Result<String, VoiceError> {
        let twiml = bridge_twiml(bridge_url);
        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Twiml", twiml.as_str()),
            ("StatusCallback", status_callback_url),
            ("StatusCallbackEvent", "initiated"),
            ("StatusCallbackEvent", "ringing"),
            ("StatusCallbackEvent", "answered"),
            ("StatusCallbackEvent", "completed"),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| VoiceError::Telephony(format!("call creation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoiceError::Telephony(format!(
                "call creation returned {}",
                response.status()
            )));
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| VoiceError::Telephony(format!("unparseable call resource: {}", e)))?;
        Ok(resource.sid)
    }

    async fn play_url(
        &self,
        call_id: &str,
        audio_url: &str,
        resume_stream_url: &str,
    ) -> Result<(), VoiceError> {
        self.update_call(call_id, play_twiml(audio_url, resume_stream_url))
            .await
    }

    async fn say(
        &self,
        call_id: &str,
        text: &str,
        resume_stream_url: Option<&str>,
    ) -> Result<(), VoiceError> {
        self.update_call(call_id, say_twiml(text, resume_stream_url))
            .await
    }
}
