//! Skeletal animation clips and playback
//!
//! An [`AnimationClip`] stores one keyframe track per bone name. An
//! [`AnimationPlayer`] binds clips to a concrete skeleton once, then every
//! update samples the playing clips and writes local bone transforms.
//!
//! ## RCANIM layout
//!
//! ```text
//! "RCANIM" u32:version(1) string:name f32:duration u32:track_count
//! track_count x { string:bone u32:key_count key_count x { f32:time vec3:position quat:rotation vec3:scale } }
//! ```

use crate::core::{EngineError, EngineResult};
use crate::events::{AnimationEvent, AnimationEventKind, EventBus};
use crate::foundation::math::Transform;
use crate::resources::resource::{Resource, ResourceKind};
use crate::resources::resource_manager::ResourceManager;
use crate::resources::skeleton::{BoneId, Skeleton};
use crate::resources::stream::{DataStream, DataWriter};
use crate::scene::node::NodeArena;
use crate::scene::SceneObjectId;
use std::sync::Arc;

const MAGIC: &[u8] = b"RCANIM";
const VERSION: u32 = 1;

/// Local bone transform at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Seconds from the clip start
    pub time: f32,
    /// Local transform
    pub transform: Transform,
}

/// Keyframes of one bone, sorted by time
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    bone: String,
    keyframes: Vec<Keyframe>,
}

impl BoneTrack {
    /// Create a track; keyframes must be sorted by time
    pub fn new(bone: impl Into<String>, keyframes: Vec<Keyframe>) -> EngineResult<Self> {
        let bone = bone.into();
        if keyframes.is_empty() {
            return Err(EngineError::invalid_params(format!("track '{bone}' has no keyframes")));
        }
        if keyframes.windows(2).any(|pair| pair[1].time < pair[0].time) {
            return Err(EngineError::invalid_params(format!("track '{bone}' keyframes are not sorted")));
        }
        Ok(Self { bone, keyframes })
    }

    /// Name of the animated bone
    pub fn bone(&self) -> &str {
        &self.bone
    }

    /// Keyframes
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Interpolated transform at `time`, clamped to the first and last key
    pub fn sample(&self, time: f32) -> Transform {
        let next = self.keyframes.partition_point(|k| k.time <= time);
        match next {
            0 => self.keyframes[0].transform,
            n if n == self.keyframes.len() => self.keyframes[n - 1].transform,
            n => {
                let (a, b) = (&self.keyframes[n - 1], &self.keyframes[n]);
                let span = b.time - a.time;
                let t = if span > f32::EPSILON { (time - a.time) / span } else { 0.0 };
                a.transform.interpolate(&b.transform, t)
            }
        }
    }
}

/// Named set of bone tracks
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    /// Empty clip of `duration` seconds
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self { name: name.into(), duration: duration.max(0.0), tracks: Vec::new() }
    }

    /// Add a track
    pub fn add_track(&mut self, track: BoneTrack) {
        self.tracks.push(track);
    }

    /// Clip name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Tracks
    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }

    /// Decode an RCANIM stream
    pub fn read(stream: &mut DataStream) -> EngineResult<Self> {
        stream.expect_magic(MAGIC)?;
        let version = stream.read_u32()?;
        if version != VERSION {
            return Err(EngineError::parse(format!("'{}': unsupported RCANIM version {version}", stream.name())));
        }

        let mut clip = AnimationClip::new(stream.read_string()?, stream.read_f32()?);
        let track_count = stream.read_u32()?;
        for _ in 0..track_count {
            let bone = stream.read_string()?;
            let key_count = stream.read_u32()? as usize;
            let mut keyframes = Vec::with_capacity(key_count.min(stream.remaining()));
            for _ in 0..key_count {
                let time = stream.read_f32()?;
                let transform = Transform::new(stream.read_vec3()?, stream.read_quat()?, stream.read_vec3()?);
                keyframes.push(Keyframe { time, transform });
            }
            clip.add_track(BoneTrack::new(bone, keyframes)?);
        }
        Ok(clip)
    }

    /// Encode as RCANIM
    pub fn write(&self, writer: &mut DataWriter) {
        writer
            .write_bytes(MAGIC)
            .write_u32(VERSION)
            .write_string(&self.name)
            .write_f32(self.duration)
            .write_u32(self.tracks.len() as u32);
        for track in &self.tracks {
            writer.write_string(&track.bone).write_u32(track.keyframes.len() as u32);
            for key in &track.keyframes {
                writer
                    .write_f32(key.time)
                    .write_vec3(&key.transform.position)
                    .write_quat(&key.transform.rotation)
                    .write_vec3(&key.transform.scale);
            }
        }
    }
}

impl Resource for AnimationClip {
    const KIND: ResourceKind = ResourceKind::Animation;

    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self> {
        let mut stream = manager.file_system().open_stream(name, group)?;
        let clip = AnimationClip::read(&mut stream)?;
        log::debug!("Loaded animation '{}' ({:.2}s, {} tracks)", clip.name, clip.duration, clip.tracks.len());
        Ok(clip)
    }
}

/// Playback state of one clip on one skeleton
#[derive(Debug, Clone)]
pub struct AnimationState {
    clip: Arc<AnimationClip>,
    bindings: Vec<(usize, BoneId)>,
    time: f32,
    looping: bool,
    playing: bool,
    started: bool,
}

impl AnimationState {
    /// Clip being played
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    /// Current time in seconds
    pub fn time_position(&self) -> f32 {
        self.time
    }

    /// Whether the clip restarts at its end
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the clip is advancing
    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Per-entity set of clips bound to its skeleton
#[derive(Debug, Clone, Default)]
pub struct AnimationPlayer {
    states: Vec<AnimationState>,
}

impl AnimationPlayer {
    /// Player without clips
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `clip` to `skeleton`
    ///
    /// Every track must name a bone of the skeleton (`ERR_ITEM_NOT_FOUND`
    /// otherwise). Adding a clip with a known name replaces it.
    pub fn add_clip(&mut self, clip: Arc<AnimationClip>, skeleton: &Skeleton) -> EngineResult<()> {
        let bindings = clip
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, track)| skeleton.bone_by_name(track.bone()).map(|bone| (index, bone)))
            .collect::<EngineResult<Vec<_>>>()?;

        let state = AnimationState { clip, bindings, time: 0.0, looping: false, playing: false, started: false };
        match self.states.iter_mut().find(|s| s.clip.name() == state.clip.name()) {
            Some(existing) => *existing = state,
            None => self.states.push(state),
        }
        Ok(())
    }

    fn state_mut(&mut self, name: &str) -> EngineResult<&mut AnimationState> {
        self.states
            .iter_mut()
            .find(|s| s.clip.name() == name)
            .ok_or_else(|| EngineError::item_not_found(format!("no animation clip '{name}'")))
    }

    /// State of a clip
    pub fn state(&self, name: &str) -> Option<&AnimationState> {
        self.states.iter().find(|s| s.clip.name() == name)
    }

    /// Names of all bound clips
    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.clip.name())
    }

    /// Start `name` from the beginning
    pub fn play(&mut self, name: &str) -> EngineResult<()> {
        let state = self.state_mut(name)?;
        state.time = 0.0;
        state.playing = true;
        state.started = false;
        Ok(())
    }

    /// Stop `name` and rewind it
    pub fn stop(&mut self, name: &str) -> EngineResult<()> {
        let state = self.state_mut(name)?;
        state.playing = false;
        state.time = 0.0;
        Ok(())
    }

    /// Make `name` loop or stop at its end
    pub fn set_looping(&mut self, name: &str, looping: bool) -> EngineResult<()> {
        self.state_mut(name)?.looping = looping;
        Ok(())
    }

    /// Jump to `time` seconds into `name`
    pub fn set_time_position(&mut self, name: &str, time: f32) -> EngineResult<()> {
        let state = self.state_mut(name)?;
        state.time = time.clamp(0.0, state.clip.duration());
        Ok(())
    }

    /// Whether any clip is playing
    pub fn is_active(&self) -> bool {
        self.states.iter().any(|s| s.playing)
    }

    /// Advance every playing clip and pose the skeleton
    ///
    /// A clip's first update shows its first frame and publishes `Begin`;
    /// later updates advance by `dt`. `Loop` is published each time a looping
    /// clip wraps and `End` when a non-looping clip finishes. A finished clip
    /// leaves the skeleton in its final pose.
    pub fn update(
        &mut self,
        dt: f32,
        skeleton: &mut Skeleton,
        entity: SceneObjectId,
        events: &mut EventBus<AnimationEvent>,
    ) -> EngineResult<()> {
        for state in self.states.iter_mut().filter(|s| s.playing) {
            let clip_name = state.clip.name().to_string();
            let mut publish = |kind| {
                events.send(AnimationEvent { kind, entity, clip: clip_name.clone() });
            };

            if !state.started {
                state.started = true;
                publish(AnimationEventKind::Begin);
            } else {
                state.time += dt;
            }

            let duration = state.clip.duration();
            if state.time >= duration {
                if state.looping && duration > 0.0 {
                    state.time %= duration;
                    publish(AnimationEventKind::Loop);
                } else {
                    state.time = duration;
                    state.playing = false;
                    publish(AnimationEventKind::End);
                }
            }

            for &(track, bone) in &state.bindings {
                let transform = state.clip.tracks()[track].sample(state.time);
                skeleton.set_transform(bone, transform)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use approx::assert_relative_eq;
    use slotmap::KeyData;

    fn slide() -> AnimationClip {
        let mut clip = AnimationClip::new("slide", 1.0);
        let keys = vec![
            Keyframe { time: 0.0, transform: Transform::identity() },
            Keyframe { time: 1.0, transform: Transform::from_position(Vec3::new(4.0, 0.0, 0.0)) },
        ];
        clip.add_track(BoneTrack::new("root", keys).unwrap());
        clip
    }

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new("s");
        skeleton.add_bone("root", None, Transform::identity(), Mat4::identity()).unwrap();
        skeleton
    }

    fn entity() -> SceneObjectId {
        SceneObjectId::from(KeyData::from_ffi(1))
    }

    #[test]
    fn test_sampling_interpolates_and_clamps() {
        let clip = slide();
        let track = &clip.tracks()[0];
        assert_relative_eq!(track.sample(-1.0).position, Vec3::zeros());
        assert_relative_eq!(track.sample(0.25).position, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(track.sample(5.0).position, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_unsorted_track_is_rejected() {
        let keys = vec![
            Keyframe { time: 1.0, transform: Transform::identity() },
            Keyframe { time: 0.5, transform: Transform::identity() },
        ];
        assert!(BoneTrack::new("b", keys).is_err());
    }

    #[test]
    fn test_player_poses_skeleton_and_publishes_events() {
        let mut skeleton = skeleton();
        let mut events = EventBus::new();
        let mut player = AnimationPlayer::new();
        player.add_clip(Arc::new(slide()), &skeleton).unwrap();
        player.play("slide").unwrap();

        player.update(0.5, &mut skeleton, entity(), &mut events).unwrap();
        player.update(0.5, &mut skeleton, entity(), &mut events).unwrap();
        let root = skeleton.bone_by_name("root").unwrap();
        assert_relative_eq!(skeleton.world_position(root).unwrap(), Vec3::new(2.0, 0.0, 0.0));

        player.update(0.6, &mut skeleton, entity(), &mut events).unwrap();
        assert!(!player.is_active());
        assert_relative_eq!(skeleton.world_position(root).unwrap(), Vec3::new(4.0, 0.0, 0.0));

        let kinds: Vec<_> = events.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AnimationEventKind::Begin, AnimationEventKind::End]);
    }

    #[test]
    fn test_looping_wraps() {
        let mut skeleton = skeleton();
        let mut events = EventBus::new();
        let mut player = AnimationPlayer::new();
        player.add_clip(Arc::new(slide()), &skeleton).unwrap();
        player.play("slide").unwrap();
        player.set_looping("slide", true).unwrap();

        player.update(0.0, &mut skeleton, entity(), &mut events).unwrap();
        player.update(1.25, &mut skeleton, entity(), &mut events).unwrap();
        assert!(player.is_active());
        assert_relative_eq!(player.state("slide").unwrap().time_position(), 0.25, epsilon = 1e-6);

        let kinds: Vec<_> = events.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AnimationEventKind::Begin, AnimationEventKind::Loop]);
    }

    #[test]
    fn test_clip_for_unknown_bone_is_rejected() {
        let mut clip = AnimationClip::new("wave", 1.0);
        let keys = vec![Keyframe { time: 0.0, transform: Transform::identity() }];
        clip.add_track(BoneTrack::new("hand", keys).unwrap());
        let error = AnimationPlayer::new().add_clip(Arc::new(clip), &skeleton()).unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::ItemNotFound);
        assert!(AnimationPlayer::new().play("wave").is_err());
    }

    #[test]
    fn test_rcanim_file() {
        let clip = slide();
        let mut writer = DataWriter::new();
        clip.write(&mut writer);
        let loaded = AnimationClip::read(&mut DataStream::from_bytes("slide.anim", writer.into_bytes())).unwrap();
        assert_eq!(loaded.name(), "slide");
        assert_relative_eq!(loaded.duration(), 1.0);
        assert_relative_eq!(loaded.tracks()[0].sample(0.5).position, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-6);
    }
}
