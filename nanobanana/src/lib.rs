//! Minimal Gemini generation client.
//!
//! This crate provides a focused client for the Gemini generateContent API
//! with:
//! - Text generation for ideation prompts
//! - Image generation with inline-data decoding to disk
//! - Automatic one-shot fallback to a secondary image model
//!
//! Image generation reports failure in-band (`ImageResponse::success`)
//! rather than through `Result`, because a failed render still carries
//! metadata the caller must record.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_FALLBACK_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Response contained no image data")]
    NoImageData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Gemini API client.
#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    api_key: String,
    text_model: String,
    image_model: String,
    fallback_image_model: String,
}

impl Client {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            fallback_image_model: DEFAULT_FALLBACK_IMAGE_MODEL.to_string(),
        }
    }

    /// Create a client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the model used for text generation.
    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Set the primary model used for image generation.
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Set the fallback model tried when the primary image model fails.
    pub fn with_fallback_image_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_image_model = model.into();
        self
    }

    /// Generate text from a prompt and return the raw model reply.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, Error> {
        let response = self.generate(&self.text_model, prompt, false).await?;

        let text = response
            .parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(Error::Parse("response contained no text".to_string()));
        }
        Ok(text)
    }

    /// Generate an image, falling back to the secondary model on failure.
    ///
    /// Never returns `Err`: failure is reported through the response so the
    /// caller can record which models were attempted.
    pub async fn generate_image(&self, request: ImageRequest) -> ImageResponse {
        match self.try_image(&self.image_model, &request).await {
            Ok(files) => ImageResponse::succeeded(files, &self.image_model),
            Err(primary_err) => {
                match self.try_image(&self.fallback_image_model, &request).await {
                    Ok(files) => ImageResponse::succeeded(files, &self.fallback_image_model)
                        .as_fallback(&self.image_model, primary_err.to_string()),
                    Err(fallback_err) => ImageResponse::failed(format!(
                        "{}: {primary_err}; {}: {fallback_err}",
                        self.image_model, self.fallback_image_model
                    )),
                }
            }
        }
    }

    /// Attempt image generation against a single model.
    async fn try_image(&self, model: &str, request: &ImageRequest) -> Result<Vec<PathBuf>, Error> {
        let response = self.generate(model, &request.prompt, true).await?;

        let mut files = Vec::new();
        for part in response.parts() {
            let Some(ref inline) = part.inline_data else {
                continue;
            };
            let bytes = BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| Error::Parse(format!("invalid image payload: {e}")))?;

            let path = request.output_path(files.len());
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;
            files.push(path);

            if files.len() >= request.output_count {
                break;
            }
        }

        if files.is_empty() {
            return Err(Error::NoImageData);
        }
        Ok(files)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        with_images: bool,
    ) -> Result<ApiResponse, Error> {
        let api_request = ApiRequest {
            contents: vec![ApiContent {
                parts: vec![ApiPart {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                }],
            }],
            generation_config: with_images.then(|| ApiGenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            }),
        };

        let response = self
            .client
            .post(format!("{API_BASE}/models/{model}:generateContent"))
            .headers(self.build_headers()?)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// An image generation request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub filename: String,
    pub resolution: String,
    pub file_format: String,
    pub output_count: usize,
    pub output_dir: PathBuf,
}

impl ImageRequest {
    /// Create a request with default settings (one 1K PNG in the current dir).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            filename: "image".to_string(),
            resolution: "1K".to_string(),
            file_format: "png".to_string(),
            output_count: 1,
            output_dir: PathBuf::from("."),
        }
    }

    /// Set the output file stem (no extension).
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the requested resolution label (e.g. "1K", "2K").
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    /// Set the output file format (extension).
    pub fn with_file_format(mut self, format: impl Into<String>) -> Self {
        self.file_format = format.into();
        self
    }

    /// Set how many images to request.
    pub fn with_output_count(mut self, count: usize) -> Self {
        self.output_count = count.max(1);
        self
    }

    /// Set the directory generated files are written to.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Path for the nth generated file of this request.
    fn output_path(&self, index: usize) -> PathBuf {
        let name = if index == 0 {
            format!("{}.{}", self.filename, self.file_format)
        } else {
            format!("{}_{}.{}", self.filename, index + 1, self.file_format)
        };
        self.output_dir.join(name)
    }
}

/// Result of an image generation attempt, including fallback metadata.
#[derive(Debug, Clone, Default)]
pub struct ImageResponse {
    pub success: bool,
    pub generated_files: Vec<PathBuf>,
    pub model_used: Option<String>,
    pub used_fallback: bool,
    pub primary_model: Option<String>,
    pub fallback_reason: Option<String>,
    pub error: Option<String>,
}

impl ImageResponse {
    /// Build a successful response for the given model.
    pub fn succeeded(files: Vec<PathBuf>, model: &str) -> Self {
        Self {
            success: true,
            generated_files: files,
            model_used: Some(model.to_string()),
            ..Default::default()
        }
    }

    /// Build a failed response carrying the combined error text.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Mark this response as produced by the fallback model.
    pub fn as_fallback(mut self, primary_model: &str, reason: impl Into<String>) -> Self {
        self.used_fallback = true;
        self.primary_model = Some(primary_model.to_string());
        self.fallback_reason = Some(reason.into());
        self
    }

    /// Human-readable descriptor of the model that produced the image,
    /// annotated with fallback provenance when applicable.
    pub fn model_descriptor(&self) -> String {
        let model = self.model_used.as_deref().unwrap_or("unknown");
        if self.used_fallback {
            format!(
                "{model} (fallback from {}, reason: {})",
                self.primary_model.as_deref().unwrap_or("unknown"),
                self.fallback_reason.as_deref().unwrap_or("unknown"),
            )
        } else {
            model.to_string()
        }
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

impl ApiResponse {
    /// All content parts across candidates, in order.
    fn parts(&self) -> impl Iterator<Item = &ApiPart> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}
