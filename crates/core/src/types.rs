//! Core entities shared by every pipeline stage.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable scene identifier; survives reordering.
pub type SceneId = Uuid;

/// Stable character identifier.
pub type CharacterId = Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Reference images
// ---------------------------------------------------------------------------

/// Raw image bytes plus the MIME type they were captured with.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// SHA-256 hex digest over the MIME type and the image bytes.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.mime_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// A recurring character whose appearance must stay consistent across scenes.
///
/// `locked_description` is derived from `reference_image` by the remote
/// service, never entered by hand. Replacing or removing the image clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    #[serde(default = "Uuid::new_v4")]
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub reference_image: Option<ReferenceImage>,
    #[serde(default)]
    pub locked_description: Option<String>,
    /// Digest of the image the locked description was derived from.
    #[serde(default)]
    pub locked_image_digest: Option<String>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            reference_image: None,
            locked_description: None,
            locked_image_digest: None,
        }
    }

    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.set_reference_image(image);
        self
    }

    /// Replace the reference image. A different image invalidates the
    /// locked description.
    pub fn set_reference_image(&mut self, image: ReferenceImage) {
        let unchanged = self
            .reference_image
            .as_ref()
            .is_some_and(|current| current == &image);
        if !unchanged {
            self.locked_description = None;
            self.locked_image_digest = None;
        }
        self.reference_image = Some(image);
    }

    /// Remove the reference image and with it the locked description.
    pub fn clear_reference_image(&mut self) {
        self.reference_image = None;
        self.locked_description = None;
        self.locked_image_digest = None;
    }

    /// Store a description resolved from the current reference image.
    pub fn lock_description(&mut self, description: impl Into<String>) {
        self.locked_image_digest = self.reference_image.as_ref().map(ReferenceImage::digest);
        self.locked_description = Some(description.into());
    }

    /// Whether the name is non-blank.
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// True when a reference image exists but no description derived from
    /// that exact image is cached.
    pub fn needs_description(&self) -> bool {
        let Some(image) = &self.reference_image else {
            return false;
        };
        let has_text = self
            .locked_description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty());
        if !has_text {
            return true;
        }
        // A description without a recorded digest was supplied by an older
        // session; trust it rather than paying for a re-resolve.
        match &self.locked_image_digest {
            Some(digest) => digest != &image.digest(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Transition applied on the edge between a scene and the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    #[default]
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
    CircleOpen,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 5] = [
        TransitionKind::Fade,
        TransitionKind::Dissolve,
        TransitionKind::WipeLeft,
        TransitionKind::WipeRight,
        TransitionKind::CircleOpen,
    ];

    /// Name of the matching ffmpeg `xfade` transition.
    pub fn xfade_name(self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipeleft",
            TransitionKind::WipeRight => "wiperight",
            TransitionKind::CircleOpen => "circleopen",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionKind::Fade => "fade",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipeLeft",
            TransitionKind::WipeRight => "wipeRight",
            TransitionKind::CircleOpen => "circleOpen",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// One narrative unit, rendered as exactly one generated clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default = "Uuid::new_v4")]
    pub id: SceneId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub character_names: Vec<String>,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub action: String,
    /// Applies to the edge towards the next scene; ignored on the last one.
    #[serde(default)]
    pub transition_to_next: TransitionKind,
}

impl Scene {
    pub fn new(
        description: impl Into<String>,
        environment: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            character_names: Vec::new(),
            environment: environment.into(),
            action: action.into(),
            transition_to_next: TransitionKind::default(),
        }
    }

    pub fn with_characters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.character_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_transition(mut self, transition: TransitionKind) -> Self {
        self.transition_to_next = transition;
        self
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Opaque reference to a produced media resource (usually a URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl ArtifactRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary media fetched for an [`ArtifactRef`].
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    pub reference: ArtifactRef,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(reference: ArtifactRef, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            reference,
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("reference", &self.reference)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Serialize `Vec<u8>` as standard base64 text.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portrait(bytes: &[u8]) -> ReferenceImage {
        ReferenceImage::new("image/png", bytes.to_vec())
    }

    // -- Character description invalidation --

    #[test]
    fn new_image_clears_locked_description() {
        let mut c = Character::new("Mara").with_reference_image(portrait(b"one"));
        c.lock_description("red coat, short silver hair");
        assert!(!c.needs_description());

        c.set_reference_image(portrait(b"two"));
        assert!(c.locked_description.is_none());
        assert!(c.needs_description());
    }

    #[test]
    fn same_image_keeps_locked_description() {
        let mut c = Character::new("Mara").with_reference_image(portrait(b"one"));
        c.lock_description("red coat");
        c.set_reference_image(portrait(b"one"));
        assert_eq!(c.locked_description.as_deref(), Some("red coat"));
        assert!(!c.needs_description());
    }

    #[test]
    fn clearing_image_clears_description() {
        let mut c = Character::new("Mara").with_reference_image(portrait(b"one"));
        c.lock_description("red coat");
        c.clear_reference_image();
        assert!(c.locked_description.is_none());
        assert!(!c.needs_description());
    }

    #[test]
    fn digest_mismatch_requires_new_description() {
        let mut c = Character::new("Mara").with_reference_image(portrait(b"one"));
        c.lock_description("red coat");
        // Bypass the setter, as a hand-edited session file would.
        c.reference_image = Some(portrait(b"other"));
        assert!(c.needs_description());
    }

    #[test]
    fn digest_covers_bytes_and_mime_type() {
        let png = portrait(b"one");
        assert_eq!(png.digest(), portrait(b"one").digest());
        assert_eq!(png.digest().len(), 64);
        assert_ne!(png.digest(), portrait(b"two").digest());
        assert_ne!(
            png.digest(),
            ReferenceImage::new("image/jpeg", b"one".to_vec()).digest()
        );
    }

    #[test]
    fn character_without_image_never_needs_description() {
        assert!(!Character::new("Mara").needs_description());
    }

    #[test]
    fn blank_names_are_not_named() {
        assert!(!Character::new("   ").is_named());
        assert!(Character::new(" Ivo ").is_named());
    }

    // -- Transitions --

    #[test]
    fn transition_default_is_fade() {
        assert_eq!(TransitionKind::default(), TransitionKind::Fade);
    }

    #[test]
    fn transition_serializes_camel_case() {
        let json = serde_json::to_string(&TransitionKind::WipeLeft).unwrap();
        assert_eq!(json, "\"wipeLeft\"");
        let parsed: TransitionKind = serde_json::from_str("\"circleOpen\"").unwrap();
        assert_eq!(parsed, TransitionKind::CircleOpen);
    }

    #[test]
    fn transition_xfade_names() {
        let names: Vec<_> = TransitionKind::ALL.iter().map(|t| t.xfade_name()).collect();
        assert_eq!(
            names,
            ["fade", "dissolve", "wipeleft", "wiperight", "circleopen"]
        );
    }

    // -- Serde --

    #[test]
    fn scene_deserializes_with_defaults() {
        let scene: Scene = serde_json::from_str(r#"{"description": "Dawn"}"#).unwrap();
        assert_eq!(scene.description, "Dawn");
        assert!(scene.character_names.is_empty());
        assert_eq!(scene.transition_to_next, TransitionKind::Fade);
    }

    #[test]
    fn reference_image_data_is_base64() {
        let json = serde_json::to_value(portrait(b"abc")).unwrap();
        assert_eq!(json["data"], "YWJj");
        let back: ReferenceImage = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, b"abc");
    }
}
