//! Continuity model ("bible") shared by every scene of a run.
//!
//! The model is derived once per run from the session's characters and
//! scenes and never changes afterwards; the pipeline shares it behind an
//! `Arc`. Building it is a pure transformation.

use serde::Serialize;

use crate::types::{Character, Scene};

/// Prefix for synthetic environment identifiers (`env_1`, `env_2`, ...).
pub const ENVIRONMENT_ID_PREFIX: &str = "env_";

/// A distinct location referenced by one or more scenes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub id: String,
    pub description: String,
}

/// Consistency context every scene prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinuityModel {
    characters: Vec<Character>,
    environments: Vec<Environment>,
    style: String,
    genre: String,
}

impl ContinuityModel {
    /// Build the model from the current session state.
    ///
    /// - Characters with a blank name are dropped.
    /// - Environments are deduplicated by trimmed text and numbered in
    ///   order of first appearance. Blank environments are skipped.
    pub fn build(characters: &[Character], scenes: &[Scene], style: &str, genre: &str) -> Self {
        let characters = characters
            .iter()
            .filter(|c| c.is_named())
            .cloned()
            .collect();

        let mut environments: Vec<Environment> = Vec::new();
        for scene in scenes {
            let text = scene.environment.trim();
            if text.is_empty() || environments.iter().any(|e| e.description == text) {
                continue;
            }
            environments.push(Environment {
                id: format!("{ENVIRONMENT_ID_PREFIX}{}", environments.len() + 1),
                description: text.to_string(),
            });
        }

        Self {
            characters,
            environments,
            style: style.to_string(),
            genre: genre.to_string(),
        }
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Look up the environment entry for a scene's environment text.
    pub fn environment_for(&self, text: &str) -> Option<&Environment> {
        let text = text.trim();
        self.environments.iter().find(|e| e.description == text)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn scene(env: &str) -> Scene {
        Scene::new("something happens", env, "someone moves")
    }

    #[test]
    fn blank_named_characters_are_excluded() {
        let chars = vec![Character::new("Mara"), Character::new("  "), Character::new("")];
        let model = ContinuityModel::build(&chars, &[], "noir", "thriller");
        assert_eq!(model.characters().len(), 1);
        assert_eq!(model.characters()[0].name, "Mara");
    }

    #[test]
    fn environments_are_deduplicated_by_trimmed_text() {
        let scenes = vec![
            scene("Harbor at dusk"),
            scene("  Harbor at dusk "),
            scene("Lighthouse"),
            scene("Harbor at dusk"),
        ];
        let model = ContinuityModel::build(&[], &scenes, "noir", "thriller");
        let ids: Vec<_> = model.environments().iter().map(|e| e.id.as_str()).collect();
        let texts: Vec<_> = model
            .environments()
            .iter()
            .map(|e| e.description.as_str())
            .collect();
        assert_eq!(ids, ["env_1", "env_2"]);
        assert_eq!(texts, ["Harbor at dusk", "Lighthouse"]);
    }

    #[test]
    fn every_scene_environment_appears_exactly_once() {
        let scenes: Vec<_> = ["a", "b", " a", "c ", "b", "c", "d"]
            .iter()
            .map(|e| scene(e))
            .collect();
        let model = ContinuityModel::build(&[], &scenes, "", "");

        let distinct: HashSet<_> = scenes.iter().map(|s| s.environment.trim()).collect();
        assert_eq!(model.environments().len(), distinct.len());
        for s in &scenes {
            let matches = model
                .environments()
                .iter()
                .filter(|e| e.description == s.environment.trim())
                .count();
            assert_eq!(matches, 1, "environment {:?}", s.environment);
        }
    }

    #[test]
    fn blank_environments_are_skipped() {
        let model = ContinuityModel::build(&[], &[scene("   "), scene("Forest")], "", "");
        assert_eq!(model.environments().len(), 1);
        assert_eq!(model.environments()[0].id, "env_1");
    }

    #[test]
    fn environment_lookup_trims_input() {
        let model = ContinuityModel::build(&[], &[scene("Forest")], "", "");
        assert_eq!(model.environment_for(" Forest ").map(|e| e.id.as_str()), Some("env_1"));
        assert!(model.environment_for("Desert").is_none());
    }

    #[test]
    fn style_and_genre_are_kept() {
        let model = ContinuityModel::build(&[], &[], "watercolor", "fable");
        assert_eq!(model.style(), "watercolor");
        assert_eq!(model.genre(), "fable");
    }
}
