//! Composition spec and transition filter-graph construction.
//!
//! Clips are joined with a chain of ffmpeg `xfade` nodes: the output of
//! transition *i-1* is the left input of transition *i*, and the first left
//! input is clip 0. Audio, when every clip has it, is chained in parallel
//! with `acrossfade` using the same duration.
//!
//! Offsets assume every clip contributes the same content duration before
//! its transition starts, so transition *i* begins at `(i + 1) * content`.
//! Clips of differing real length will drift out of sync with this layout;
//! callers probe durations and warn but do not re-time the graph.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{Artifact, Scene, SceneId, TransitionKind};

/// Seconds of content each clip contributes before its transition.
pub const DEFAULT_CONTENT_DURATION_SECS: f64 = 7.0;
/// Length of every transition in seconds.
pub const DEFAULT_TRANSITION_DURATION_SECS: f64 = 1.0;

/// Label of the final video stream in the filter graph.
pub const VIDEO_OUTPUT_LABEL: &str = "vout";
/// Label of the final audio stream in the filter graph.
pub const AUDIO_OUTPUT_LABEL: &str = "aout";

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Uniform clip timing used to place transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositionTiming {
    pub content_duration_secs: f64,
    pub transition_duration_secs: f64,
}

impl Default for CompositionTiming {
    fn default() -> Self {
        Self {
            content_duration_secs: DEFAULT_CONTENT_DURATION_SECS,
            transition_duration_secs: DEFAULT_TRANSITION_DURATION_SECS,
        }
    }
}

impl CompositionTiming {
    /// Offset at which transition `index` (0-based) starts.
    pub fn transition_offset(&self, index: usize) -> f64 {
        (index as f64 + 1.0) * self.content_duration_secs
    }

    /// Expected length of one source clip.
    pub fn expected_clip_secs(&self) -> f64 {
        self.content_duration_secs + self.transition_duration_secs
    }

    /// Expected length of the composed output for `clip_count` clips.
    pub fn expected_output_secs(&self, clip_count: usize) -> f64 {
        if clip_count == 0 {
            return 0.0;
        }
        clip_count as f64 * self.content_duration_secs + self.transition_duration_secs
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.content_duration_secs.is_nan() || self.content_duration_secs <= 0.0 {
            return Err(CoreError::Validation(
                "content duration must be positive".to_string(),
            ));
        }
        if self.transition_duration_secs.is_nan() || self.transition_duration_secs <= 0.0 {
            return Err(CoreError::Validation(
                "transition duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Composition spec
// ---------------------------------------------------------------------------

/// A scene's generated clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedClip {
    pub scene_id: SceneId,
    pub artifact: Artifact,
}

/// One clip in composition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionEntry {
    pub scene_id: SceneId,
    pub artifact: Artifact,
    /// Ignored on the last entry.
    pub transition_to_next: TransitionKind,
}

/// Ordered clips plus the transition on each edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionSpec {
    entries: Vec<CompositionEntry>,
}

impl CompositionSpec {
    pub fn new(entries: Vec<CompositionEntry>) -> Self {
        Self { entries }
    }

    /// Map completed clips onto the current scene order.
    ///
    /// Scenes without a completed clip are dropped. The transition on each
    /// edge comes from the scene on its left in `scenes`.
    pub fn from_clips(scenes: &[Scene], clips: &[CompletedClip]) -> Self {
        let entries = scenes
            .iter()
            .filter_map(|scene| {
                clips
                    .iter()
                    .find(|clip| clip.scene_id == scene.id)
                    .map(|clip| CompositionEntry {
                        scene_id: scene.id,
                        artifact: clip.artifact.clone(),
                        transition_to_next: scene.transition_to_next,
                    })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CompositionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Transitions on the `len - 1` edges between adjacent clips.
    pub fn transitions(&self) -> Vec<TransitionKind> {
        match self.entries.split_last() {
            Some((_, head)) => head.iter().map(|e| e.transition_to_next).collect(),
            None => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter graph
// ---------------------------------------------------------------------------

/// One `xfade` node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XfadeNode {
    pub left: String,
    pub right: String,
    pub output: String,
    pub transition: TransitionKind,
    pub duration_secs: f64,
    pub offset_secs: f64,
}

/// One `acrossfade` node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFadeNode {
    pub left: String,
    pub right: String,
    pub output: String,
    pub duration_secs: f64,
}

/// Transition chain for `transitions.len() + 1` input clips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGraph {
    pub video: Vec<XfadeNode>,
    pub audio: Vec<AudioFadeNode>,
}

impl FilterGraph {
    /// Build the chain for the given edge transitions.
    ///
    /// At least one transition (two clips) is required.
    pub fn build(
        transitions: &[TransitionKind],
        timing: &CompositionTiming,
        with_audio: bool,
    ) -> Result<Self, CoreError> {
        timing.validate()?;
        if transitions.is_empty() {
            return Err(CoreError::Validation(
                "a filter graph needs at least two clips".to_string(),
            ));
        }

        let last = transitions.len() - 1;
        let mut video = Vec::with_capacity(transitions.len());
        let mut audio = Vec::new();
        let mut left_video = "0:v".to_string();
        let mut left_audio = "0:a".to_string();

        for (i, transition) in transitions.iter().enumerate() {
            let (video_out, audio_out) = if i == last {
                (VIDEO_OUTPUT_LABEL.to_string(), AUDIO_OUTPUT_LABEL.to_string())
            } else {
                (format!("v{}", i + 1), format!("a{}", i + 1))
            };

            video.push(XfadeNode {
                left: left_video,
                right: format!("{}:v", i + 1),
                output: video_out.clone(),
                transition: *transition,
                duration_secs: timing.transition_duration_secs,
                offset_secs: timing.transition_offset(i),
            });
            left_video = video_out;

            if with_audio {
                audio.push(AudioFadeNode {
                    left: left_audio,
                    right: format!("{}:a", i + 1),
                    output: audio_out.clone(),
                    duration_secs: timing.transition_duration_secs,
                });
            }
            left_audio = audio_out;
        }

        Ok(Self { video, audio })
    }

    /// Number of input clips the graph expects.
    pub fn input_count(&self) -> usize {
        self.video.len() + 1
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Render as an ffmpeg `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        let video = self.video.iter().map(|n| {
            format!(
                "[{}][{}]xfade=transition={}:duration={:.3}:offset={:.3}[{}]",
                n.left,
                n.right,
                n.transition.xfade_name(),
                n.duration_secs,
                n.offset_secs,
                n.output
            )
        });
        let audio = self.audio.iter().map(|n| {
            format!(
                "[{}][{}]acrossfade=d={:.3}[{}]",
                n.left, n.right, n.duration_secs, n.output
            )
        });
        video.chain(audio).collect::<Vec<_>>().join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactRef;

    fn clip(scene: &Scene, name: &str) -> CompletedClip {
        CompletedClip {
            scene_id: scene.id,
            artifact: Artifact::new(ArtifactRef::new(name), "video/mp4", name.as_bytes().to_vec()),
        }
    }

    // -- Offsets --

    #[test]
    fn offsets_follow_uniform_duration_law() {
        let timing = CompositionTiming::default();
        let transitions = vec![TransitionKind::Fade; 5];
        let graph = FilterGraph::build(&transitions, &timing, false).unwrap();
        for (i, node) in graph.video.iter().enumerate() {
            assert_eq!(node.offset_secs, (i as f64 + 1.0) * 7.0);
            assert_eq!(node.duration_secs, 1.0);
        }
    }

    #[test]
    fn offsets_scale_with_custom_timing() {
        let timing = CompositionTiming {
            content_duration_secs: 4.5,
            transition_duration_secs: 0.5,
        };
        assert_eq!(timing.transition_offset(0), 4.5);
        assert_eq!(timing.transition_offset(3), 18.0);
        assert_eq!(timing.expected_output_secs(3), 14.0);
    }

    // -- Chaining --

    #[test]
    fn nodes_chain_left_inputs() {
        let transitions = [
            TransitionKind::Fade,
            TransitionKind::WipeLeft,
            TransitionKind::CircleOpen,
        ];
        let graph =
            FilterGraph::build(&transitions, &CompositionTiming::default(), false).unwrap();
        let labels: Vec<_> = graph
            .video
            .iter()
            .map(|n| (n.left.as_str(), n.right.as_str(), n.output.as_str()))
            .collect();
        assert_eq!(
            labels,
            [("0:v", "1:v", "v1"), ("v1", "2:v", "v2"), ("v2", "3:v", "vout")]
        );
        assert_eq!(graph.input_count(), 4);
        assert!(!graph.has_audio());
    }

    #[test]
    fn filter_complex_for_three_clips_with_audio() {
        let transitions = [TransitionKind::Dissolve, TransitionKind::WipeRight];
        let graph = FilterGraph::build(&transitions, &CompositionTiming::default(), true).unwrap();
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v][1:v]xfade=transition=dissolve:duration=1.000:offset=7.000[v1];\
             [v1][2:v]xfade=transition=wiperight:duration=1.000:offset=14.000[vout];\
             [0:a][1:a]acrossfade=d=1.000[a1];\
             [a1][2:a]acrossfade=d=1.000[aout]"
        );
    }

    #[test]
    fn graph_requires_two_clips() {
        let err = FilterGraph::build(&[], &CompositionTiming::default(), false).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn graph_rejects_non_positive_timing() {
        let timing = CompositionTiming {
            content_duration_secs: 0.0,
            transition_duration_secs: 1.0,
        };
        assert!(FilterGraph::build(&[TransitionKind::Fade], &timing, false).is_err());
    }

    // -- Spec mapping --

    #[test]
    fn spec_follows_current_scene_order_and_drops_missing() {
        let a = Scene::new("a", "x", "").with_transition(TransitionKind::WipeLeft);
        let b = Scene::new("b", "x", "").with_transition(TransitionKind::Dissolve);
        let c = Scene::new("c", "x", "").with_transition(TransitionKind::CircleOpen);
        let clips = vec![clip(&a, "a"), clip(&c, "c")];

        // Reordered after the run: c, b, a.
        let order = vec![c.clone(), b.clone(), a.clone()];
        let spec = CompositionSpec::from_clips(&order, &clips);

        let names: Vec<_> = spec
            .entries()
            .iter()
            .map(|e| e.artifact.reference.as_str())
            .collect();
        assert_eq!(names, ["c", "a"]);
        assert_eq!(spec.transitions(), [TransitionKind::CircleOpen]);
    }

    #[test]
    fn empty_spec_has_no_transitions() {
        assert!(CompositionSpec::default().transitions().is_empty());
    }
}
