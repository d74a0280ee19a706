//! Story file loading.
//!
//! A story file is JSON describing the characters, the ordered scenes and
//! the global style. Character images are paths relative to the story
//! file:
//!
//! ```json
//! {
//!   "style": "film noir",
//!   "genre": "mystery",
//!   "characters": [{ "name": "Mara", "image": "mara.png" }],
//!   "scenes": [{
//!     "description": "Mara arrives at the docks",
//!     "characters": ["Mara"],
//!     "environment": "Harbor at night",
//!     "action": "She lights a cigarette",
//!     "transition": "dissolve"
//!   }]
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use reelforge_core::prompt::{DEFAULT_GENRE, DEFAULT_STYLE};
use reelforge_core::types::{Character, ReferenceImage, Scene, TransitionKind};
use reelforge_pipeline::Session;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StoryFile {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub characters: Vec<StoryCharacter>,
    #[serde(default)]
    pub scenes: Vec<StoryScene>,
}

#[derive(Debug, Deserialize)]
pub struct StoryCharacter {
    pub name: String,
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Previously resolved description, reused if present.
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoryScene {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub transition: TransitionKind,
}

/// Image content type from the file extension.
pub fn image_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// Read a story file and build a session from it.
pub async fn load_session(path: &Path) -> anyhow::Result<Session> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading story file {}", path.display()))?;
    let story: StoryFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing story file {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut session = Session::new(
        story.style.unwrap_or_else(|| DEFAULT_STYLE.to_string()),
        story.genre.unwrap_or_else(|| DEFAULT_GENRE.to_string()),
    );

    for entry in story.characters {
        let mut character = Character::new(entry.name);
        if let Some(image_path) = entry.image {
            let full = base.join(&image_path);
            let data = tokio::fs::read(&full)
                .await
                .with_context(|| format!("reading character image {}", full.display()))?;
            character.set_reference_image(ReferenceImage::new(image_mime_type(&full), data));
            if let Some(description) = entry.description.filter(|d| !d.trim().is_empty()) {
                character.lock_description(description);
            }
        }
        session.upsert_character(character);
    }

    for entry in story.scenes {
        session.add_scene(
            Scene::new(entry.description, entry.environment, entry.action)
                .with_characters(entry.characters)
                .with_transition(entry.transition),
        );
    }

    Ok(session)
}
