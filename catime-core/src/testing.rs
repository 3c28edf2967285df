//! Testing utilities.
//!
//! Scripted stand-ins for the two external collaborators (the generation
//! capability and the publish transport) so full cycles run
//! deterministically without network, API keys, or a git checkout.

use crate::generate::Generator;
use crate::publish::{PublishError, PushOutcome, Remote};
use async_trait::async_trait;
use nanobanana::{ImageRequest, ImageResponse};
use std::path::PathBuf;
use std::sync::Mutex;

/// A generator that returns canned replies.
pub struct ScriptedGenerator {
    idea_reply: Result<String, String>,
    image: ImageResponse,
    /// Prompts received, for asserting on assembled text.
    pub seen_prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Succeed with the given ideation reply and a rendered file.
    pub fn succeeding(idea_reply: impl Into<String>) -> Self {
        Self {
            idea_reply: Ok(idea_reply.into()),
            image: ImageResponse::succeeded(
                vec![PathBuf::from("/tmp/cat_test.png")],
                "scripted-model",
            ),
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the ideation call.
    pub fn failing_ideation(error: impl Into<String>) -> Self {
        Self {
            idea_reply: Err(error.into()),
            image: ImageResponse::failed("unreachable"),
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Succeed at ideation but fail the render call.
    pub fn failing_render(idea_reply: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            idea_reply: Ok(idea_reply.into()),
            image: ImageResponse::failed(error),
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Override the scripted image response.
    pub fn with_image(mut self, image: ImageResponse) -> Self {
        self.image = image;
        self
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn ideate(&self, prompt: &str) -> Result<String, nanobanana::Error> {
        self.seen_prompts.lock().unwrap().push(prompt.to_string());
        self.idea_reply
            .clone()
            .map_err(nanobanana::Error::Network)
    }

    async fn render(&self, request: ImageRequest) -> ImageResponse {
        self.seen_prompts.lock().unwrap().push(request.prompt);
        self.image.clone()
    }
}

/// An in-memory remote with scripted push outcomes.
///
/// Pushes consume outcomes in order; once the script runs out, every
/// further push is accepted.
pub struct ScriptedRemote {
    outcomes: Vec<PushOutcome>,
    pub commits: Vec<String>,
    pub pushes: u32,
    pub rebases: u32,
}

impl ScriptedRemote {
    pub fn new(outcomes: Vec<PushOutcome>) -> Self {
        Self {
            outcomes,
            commits: Vec::new(),
            pushes: 0,
            rebases: 0,
        }
    }

    /// A remote that accepts every push.
    pub fn accepting() -> Self {
        Self::new(Vec::new())
    }
}

impl Remote for ScriptedRemote {
    fn commit(&mut self, _paths: &[PathBuf], message: &str) -> Result<(), PublishError> {
        self.commits.push(message.to_string());
        Ok(())
    }

    fn push(&mut self) -> Result<PushOutcome, PublishError> {
        let outcome = if (self.pushes as usize) < self.outcomes.len() {
            self.outcomes[self.pushes as usize]
        } else {
            PushOutcome::Accepted
        };
        self.pushes += 1;
        Ok(outcome)
    }

    fn pull_rebase(&mut self) -> Result<(), PublishError> {
        self.rebases += 1;
        Ok(())
    }
}
