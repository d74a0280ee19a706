//! Editable story state and the immutable snapshot a run works from.

use std::sync::Arc;

use reelforge_core::continuity::ContinuityModel;
use reelforge_core::error::CoreError;
use reelforge_core::prompt::{DEFAULT_GENRE, DEFAULT_STYLE};
use reelforge_core::types::{Character, ReferenceImage, Scene, SceneId};
use serde::{Deserialize, Serialize};

/// Characters, ordered scenes and global style for one story.
///
/// Owned by the caller and passed into each run. A run only writes back
/// resolved character descriptions; everything else is read from a
/// [`RunSnapshot`] taken after the precheck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_genre")]
    pub genre: String,
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

fn default_genre() -> String {
    DEFAULT_GENRE.to_string()
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_STYLE, DEFAULT_GENRE)
    }
}

impl Session {
    pub fn new(style: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            characters: Vec::new(),
            scenes: Vec::new(),
            style: style.into(),
            genre: genre.into(),
        }
    }

    // ---- scenes ----

    /// Append a scene and return its id.
    pub fn add_scene(&mut self, scene: Scene) -> SceneId {
        let id = scene.id;
        self.scenes.push(scene);
        id
    }

    /// Remove a scene by id.
    pub fn remove_scene(&mut self, id: SceneId) -> Result<Scene, CoreError> {
        let index = self.scene_index(id)?;
        Ok(self.scenes.remove(index))
    }

    /// Move a scene to position `to`, shifting the others. Scene ids are
    /// unaffected.
    pub fn move_scene(&mut self, id: SceneId, to: usize) -> Result<(), CoreError> {
        let from = self.scene_index(id)?;
        if to >= self.scenes.len() {
            return Err(CoreError::Validation(format!(
                "scene position {to} is out of range (have {})",
                self.scenes.len()
            )));
        }
        let scene = self.scenes.remove(from);
        self.scenes.insert(to, scene);
        Ok(())
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    fn scene_index(&self, id: SceneId) -> Result<usize, CoreError> {
        self.scenes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("scene {id}")))
    }

    // ---- characters ----

    /// Insert a character, or update the one with the same trimmed name.
    ///
    /// An update keeps the existing id. Its cached description survives
    /// only when the reference image is unchanged.
    pub fn upsert_character(&mut self, character: Character) -> &mut Character {
        let name = character.name.trim().to_string();
        match self.characters.iter().position(|c| c.name.trim() == name) {
            Some(index) => {
                let existing = &mut self.characters[index];
                match character.reference_image {
                    Some(image) => existing.set_reference_image(image),
                    None => existing.clear_reference_image(),
                }
                if character.locked_description.is_some() {
                    existing.locked_description = character.locked_description;
                    existing.locked_image_digest = character.locked_image_digest;
                }
                existing
            }
            None => {
                self.characters.push(character);
                let last = self.characters.len() - 1;
                &mut self.characters[last]
            }
        }
    }

    /// Replace or remove a character's reference image by name.
    pub fn set_character_image(
        &mut self,
        name: &str,
        image: Option<ReferenceImage>,
    ) -> Result<(), CoreError> {
        let name = name.trim();
        let character = self
            .characters
            .iter_mut()
            .find(|c| c.name.trim() == name)
            .ok_or_else(|| CoreError::NotFound(format!("character '{name}'")))?;
        match image {
            Some(image) => character.set_reference_image(image),
            None => character.clear_reference_image(),
        }
        Ok(())
    }

    pub fn character(&self, name: &str) -> Option<&Character> {
        let name = name.trim();
        self.characters.iter().find(|c| c.name.trim() == name)
    }

    // ---- snapshots ----

    /// Continuity model for the current state.
    pub fn continuity_model(&self) -> ContinuityModel {
        ContinuityModel::build(&self.characters, &self.scenes, &self.style, &self.genre)
    }

    /// Freeze the current scenes and continuity model for a run.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            scenes: self.scenes.clone(),
            model: Arc::new(self.continuity_model()),
        }
    }
}

/// Read-only view of a session captured at run start.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub scenes: Vec<Scene>,
    pub model: Arc<ContinuityModel>,
}

impl RunSnapshot {
    /// Reference images sent with every scene request.
    pub fn reference_images(&self) -> Vec<ReferenceImage> {
        self.model
            .characters()
            .iter()
            .filter_map(|c| c.reference_image.clone())
            .collect()
    }
}
