//! HTTP TTS backend (§4.5): POST `(text, voice, rate, pitch, format)`,
//! stream the audio response back as binary chunks.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use voxbridge_config::TtsConfig;
use voxbridge_core::traits::{TextToSpeech, TtsMetadata, TtsOutput};
use voxbridge_core::{Error, Result};

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: f32,
    pitch: f32,
    format: &'a str,
    sample_rate: u32,
}

pub struct HttpTtsProvider {
    client: Client,
    url: String,
    default_voice: String,
    sample_rate: u32,
}

impl HttpTtsProvider {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            default_voice: config.default_voice.clone(),
            sample_rate: config.sample_rate,
        }
    }
}

#[async_trait]
impl TextToSpeech for HttpTtsProvider {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
        rate: f32,
        pitch: f32,
    ) -> Result<(TtsOutput, TtsMetadata)> {
        let body = SynthesizeRequest {
            text,
            voice: voice.unwrap_or(&self.default_voice),
            rate,
            pitch,
            format: "wav",
            sample_rate: self.sample_rate,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "tts backend returned {status}: {detail}"
            )));
        }

        let sample_rate = response
            .headers()
            .get("x-sample-rate")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(self.sample_rate);
        let duration_ms = response
            .headers()
            .get("x-audio-duration-ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        let byte_stream = response.bytes_stream();
        let chunks = Box::pin(futures::StreamExt::map(byte_stream, |item| {
            item.map(|bytes| bytes.to_vec())
                .map_err(|e| Error::Transport(e.to_string()))
        }));

        Ok((
            TtsOutput { chunks },
            TtsMetadata {
                duration_ms,
                sample_rate,
            },
        ))
    }
}
