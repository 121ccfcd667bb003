use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::config::NarrationConfig;
use crate::viewport::{Viewport, format_zoom};

/// Short HUD-style write-up of a viewport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    pub title: String,
    pub description: String,
    #[serde(rename = "mathFact")]
    pub fact: String,
}

impl Narration {
    pub fn missing_credential(env_var: &str) -> Self {
        Narration {
            title: "API Key Missing".to_string(),
            description: format!("Please set the {} environment variable to use the AI features.", env_var),
            fact: "Cannot connect to neural link.".to_string(),
        }
    }

    pub fn unavailable() -> Self {
        Narration {
            title: "Sector Analysis Failed".to_string(),
            description: "Interference detected. Unable to retrieve data from the core.".to_string(),
            fact: "System Offline.".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("no API key configured (set {0})")]
    MissingCredential(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("service returned no text")]
    EmptyResponse,
    #[error("malformed narration: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ── generateContent wire format ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn narration_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "mathFact": { "type": "STRING" }
        },
        "required": ["title", "description", "mathFact"]
    })
}

pub fn narration_prompt(viewport: &Viewport) -> String {
    format!(
        "I am exploring a fractal.\n\
         Type: {}\n\
         Center Coordinates: Real: {}, Imaginary: {}\n\
         Zoom Level: {}\n\n\
         Provide a short, sci-fi HUD style analysis of this sector.\n\
         1. A cool Title for this region.\n\
         2. A poetic description of the visual complexity (max 2 sentences).\n\
         3. A math fact about this specific location or fractal type (max 1 sentence).\n\n\
         Return in JSON.",
        viewport.fractal.name(),
        viewport.center.re,
        viewport.center.im,
        format_zoom(viewport.zoom)
    )
}

/// Pulls the narration JSON out of a raw generateContent response body.
pub fn parse_generate_response(body: &str) -> Result<Narration, NarrationError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .map(|p| p.text)
        .collect();

    let text = text.trim();
    if text.is_empty() {
        return Err(NarrationError::EmptyResponse);
    }
    Ok(serde_json::from_str(text)?)
}

pub struct NarrationBridge {
    config: NarrationConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl NarrationBridge {
    pub fn new(config: NarrationConfig, api_key: Option<String>) -> Self {
        Self {
            config,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Always yields something displayable; failures become fallback payloads.
    pub async fn describe_viewport(&self, viewport: &Viewport) -> Narration {
        match self.query_viewport(viewport).await {
            Ok(narration) => narration,
            Err(NarrationError::MissingCredential(var)) => {
                log::warn!("narration skipped: {} not set", var);
                Narration::missing_credential(&var)
            }
            Err(e) => {
                log::error!("narration failed: {}", e);
                Narration::unavailable()
            }
        }
    }

    pub async fn query_viewport(&self, viewport: &Viewport) -> Result<Narration, NarrationError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(NarrationError::MissingCredential(self.config.api_key_env.clone()));
        };

        let request = GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: narration_prompt(viewport) }] }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: narration_schema(),
            },
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));

        let call = async {
            let response = self
                .client
                .post(&url)
                .query(&[("key", key)])
                .json(&request)
                .send()
                .await?
                .error_for_status()?;
            Ok::<String, reqwest::Error>(response.text().await?)
        };

        let body = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| NarrationError::Timeout(timeout))??;

        parse_generate_response(&body)
    }
}

/// Runs narration requests off the render thread, one at a time.
pub struct Narrator {
    bridge: Arc<NarrationBridge>,
    runtime: Handle,
    in_flight: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<Narration>>>,
}

impl Narrator {
    pub fn new(bridge: NarrationBridge, runtime: Handle) -> Self {
        Narrator {
            bridge: Arc::new(bridge),
            runtime,
            in_flight: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Starts a request for `viewport`. Returns false, doing nothing, while
    /// another request is still pending.
    pub fn request(&self, viewport: Viewport) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            log::info!("narration already in flight, ignoring request");
            return false;
        }
        log::info!(
            "requesting narration for {} at ({:.6}, {:.6}) zoom {:.2e}",
            viewport.fractal,
            viewport.center.re,
            viewport.center.im,
            viewport.zoom
        );

        let bridge = Arc::clone(&self.bridge);
        let in_flight = Arc::clone(&self.in_flight);
        let latest = Arc::clone(&self.latest);
        self.runtime.spawn(async move {
            let narration = bridge.describe_viewport(&viewport).await;
            *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(narration);
            in_flight.store(false, Ordering::Release);
        });
        true
    }

    fn slot(&self) -> MutexGuard<'_, Option<Narration>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Most recent completed narration, if any.
    pub fn latest(&self) -> Option<Narration> {
        self.slot().clone()
    }

    pub fn dismiss(&self) {
        *self.slot() = None;
    }
}
