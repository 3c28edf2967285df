//! Seam to the external generation capability.
//!
//! Two calls per cycle: a text ideation call whose reply goes through the
//! tolerant parser, and an image render call. The trait exists so the run
//! orchestration can be exercised with scripted responses; the production
//! implementation delegates to the nanobanana client.

use async_trait::async_trait;
use nanobanana::{ImageRequest, ImageResponse};

/// The generation capability as the run orchestration sees it.
#[async_trait]
pub trait Generator {
    /// Generate free-form text for an ideation prompt.
    async fn ideate(&self, prompt: &str) -> Result<String, nanobanana::Error>;

    /// Render an image; failure is reported in-band by the response.
    async fn render(&self, request: ImageRequest) -> ImageResponse;
}

/// Production generator backed by the Gemini client.
pub struct NanobananaGenerator {
    client: nanobanana::Client,
}

impl NanobananaGenerator {
    pub fn new(client: nanobanana::Client) -> Self {
        Self { client }
    }

    /// Build from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, nanobanana::Error> {
        Ok(Self::new(nanobanana::Client::from_env()?))
    }
}

#[async_trait]
impl Generator for NanobananaGenerator {
    async fn ideate(&self, prompt: &str) -> Result<String, nanobanana::Error> {
        self.client.generate_text(prompt).await
    }

    async fn render(&self, request: ImageRequest) -> ImageResponse {
        self.client.generate_image(request).await
    }
}
