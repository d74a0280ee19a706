//! Scene directive composition.
//!
//! Turns one scene plus the run's [`ContinuityModel`] into the single text
//! directive submitted to the generative service. Output is a pure function
//! of its inputs: identical inputs yield byte-identical directives, and every
//! directive starts with [`directive_prefix`].

use crate::continuity::ContinuityModel;
use crate::types::Scene;

// ---------------------------------------------------------------------------
// Defaults for missing fields
// ---------------------------------------------------------------------------

/// Style used when the session leaves it blank.
pub const DEFAULT_STYLE: &str = "cinematic";
/// Genre used when the session leaves it blank.
pub const DEFAULT_GENRE: &str = "drama";
/// Scene description used when the scene has none.
pub const DEFAULT_DESCRIPTION: &str = "An unspecified moment in the story.";
/// Environment used when the scene has none.
pub const DEFAULT_ENVIRONMENT: &str = "Unspecified location consistent with the story so far.";
/// Action used when the scene has none.
pub const DEFAULT_ACTION: &str = "The characters react naturally to the moment.";
/// Rendered when a scene names no characters.
pub const NO_CHARACTERS: &str = "None specified";

/// Placeholder for a character with no locked description.
pub const APPEARANCE_PLACEHOLDER: &str =
    "Appearance not locked; infer it from the narrative context and keep it consistent.";

/// Instruction block added to the first scene of every run.
pub const LOCK_INSTRUCTIONS: &str = "CHARACTER LOCK: This is the opening scene. \
Establish each character's face, build, hair, wardrobe and colour palette exactly as \
described below and lock these designs permanently. Every later scene must reproduce \
them without variation.";

/// Continuity note for the first scene.
pub const FIRST_SCENE_NOTE: &str = "This is the first scene; establish the tone, \
palette and visual language for the whole film.";

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// The exact opening clause of every directive.
///
/// Style and genre are embedded verbatim; blank values fall back to
/// [`DEFAULT_STYLE`] and [`DEFAULT_GENRE`].
pub fn directive_prefix(style: &str, genre: &str) -> String {
    format!(
        "Create a {} style video clip in the {} genre.",
        or_default(style, DEFAULT_STYLE),
        or_default(genre, DEFAULT_GENRE),
    )
}

/// Render the character bible, one line per character.
pub fn character_block(model: &ContinuityModel) -> String {
    if model.characters().is_empty() {
        return format!("- {NO_CHARACTERS}");
    }
    model
        .characters()
        .iter()
        .map(|c| {
            let appearance = c
                .locked_description
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(APPEARANCE_PLACEHOLDER);
            format!("- {}: {}", c.name.trim(), appearance.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the environment bible, one line per environment.
pub fn environment_block(model: &ContinuityModel) -> String {
    if model.environments().is_empty() {
        return format!("- {DEFAULT_ENVIRONMENT}");
    }
    model
        .environments()
        .iter()
        .map(|e| format!("- {}: {}", e.id, e.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Continuity note tying a scene to the one before it.
///
/// Built from the previous scene's source fields, never from its output.
pub fn continuity_note(prev_scene: Option<&Scene>) -> String {
    match prev_scene {
        Some(prev) => format!(
            "The previous scene ended with: {} Continue smoothly from that moment, \
             keeping characters, lighting and camera language consistent.",
            or_default(&prev.action, DEFAULT_ACTION).trim()
        ),
        None => FIRST_SCENE_NOTE.to_string(),
    }
}

/// Compose the full directive for `scene`.
pub fn compose_directive(
    scene: &Scene,
    model: &ContinuityModel,
    prev_scene: Option<&Scene>,
) -> String {
    let mut sections = vec![directive_prefix(model.style(), model.genre())];

    if prev_scene.is_none() {
        sections.push(LOCK_INSTRUCTIONS.to_string());
    }

    let present = scene
        .character_names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>();
    let present = if present.is_empty() {
        NO_CHARACTERS.to_string()
    } else {
        present.join(", ")
    };

    let environment = match model.environment_for(&scene.environment) {
        Some(env) => format!("{} ({})", env.description, env.id),
        None => DEFAULT_ENVIRONMENT.to_string(),
    };

    sections.push(format!(
        "SCENE: {}\nCHARACTERS PRESENT: {}\nENVIRONMENT: {}\nACTION: {}",
        or_default(&scene.description, DEFAULT_DESCRIPTION).trim(),
        present,
        environment,
        or_default(&scene.action, DEFAULT_ACTION).trim(),
    ));
    sections.push(format!("CHARACTER BIBLE:\n{}", character_block(model)));
    sections.push(format!("ENVIRONMENT BIBLE:\n{}", environment_block(model)));
    sections.push(format!("CONTINUITY: {}", continuity_note(prev_scene)));

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Character, ReferenceImage};

    fn model(scenes: &[Scene]) -> ContinuityModel {
        let mut mara = Character::new("Mara")
            .with_reference_image(ReferenceImage::new("image/png", b"png".to_vec()));
        mara.lock_description("tall woman, red wool coat, silver bob");
        let ivo = Character::new("Ivo");
        ContinuityModel::build(&[mara, ivo], scenes, "film noir", "mystery")
    }

    fn scenes() -> Vec<Scene> {
        vec![
            Scene::new("Mara arrives at the docks", "Harbor at night", "She lights a cigarette")
                .with_characters(["Mara"]),
            Scene::new("Ivo waits in the lighthouse", "Lighthouse", "He turns off the lamp")
                .with_characters(["Ivo", "Mara"]),
        ]
    }

    #[test]
    fn directive_starts_with_exact_prefix() {
        let scenes = scenes();
        let m = model(&scenes);
        let directive = compose_directive(&scenes[1], &m, Some(&scenes[0]));
        let prefix = "Create a film noir style video clip in the mystery genre.";
        assert_eq!(directive_prefix("film noir", "mystery"), prefix);
        assert_eq!(&directive[..prefix.len()], prefix);
    }

    #[test]
    fn composition_is_deterministic() {
        let scenes = scenes();
        let m = model(&scenes);
        let a = compose_directive(&scenes[1], &m, Some(&scenes[0]));
        let b = compose_directive(&scenes[1], &m, Some(&scenes[0]));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn first_scene_gets_lock_block_after_prefix() {
        let scenes = scenes();
        let m = model(&scenes);
        let directive = compose_directive(&scenes[0], &m, None);
        assert!(directive.starts_with(&directive_prefix("film noir", "mystery")));
        assert!(directive.contains(LOCK_INSTRUCTIONS));
        assert!(directive.contains(FIRST_SCENE_NOTE));
    }

    #[test]
    fn later_scenes_reference_previous_action() {
        let scenes = scenes();
        let m = model(&scenes);
        let directive = compose_directive(&scenes[1], &m, Some(&scenes[0]));
        assert!(!directive.contains(LOCK_INSTRUCTIONS));
        assert!(directive.contains("The previous scene ended with: She lights a cigarette"));
    }

    #[test]
    fn character_block_uses_locked_description_or_placeholder() {
        let m = model(&scenes());
        let block = character_block(&m);
        assert!(block.contains("- Mara: tall woman, red wool coat, silver bob"));
        assert!(block.contains(&format!("- Ivo: {APPEARANCE_PLACEHOLDER}")));
    }

    #[test]
    fn environment_line_carries_synthetic_id() {
        let scenes = scenes();
        let m = model(&scenes);
        let directive = compose_directive(&scenes[1], &m, Some(&scenes[0]));
        assert!(directive.contains("ENVIRONMENT: Lighthouse (env_2)"));
        assert!(directive.contains("- env_1: Harbor at night\n- env_2: Lighthouse"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let blank = Scene::new("", "", "");
        let m = ContinuityModel::build(&[], std::slice::from_ref(&blank), "", "");
        let directive = compose_directive(&blank, &m, None);
        assert!(directive.starts_with(&directive_prefix(DEFAULT_STYLE, DEFAULT_GENRE)));
        assert!(directive.contains(DEFAULT_DESCRIPTION));
        assert!(directive.contains(DEFAULT_ENVIRONMENT));
        assert!(directive.contains(DEFAULT_ACTION));
        assert!(directive.contains(&format!("CHARACTERS PRESENT: {NO_CHARACTERS}")));
    }

    #[test]
    fn previous_scene_without_action_uses_default() {
        let prev = Scene::new("x", "y", "");
        assert!(continuity_note(Some(&prev)).contains(DEFAULT_ACTION));
    }
}
