//! Render queue for bucketed rendering
//!
//! Collects renderable handles per frame into five fixed buckets and sorts
//! them on demand. Following Game Engine Architecture Chapter 11.3 - Render
//! Queues.
//!
//! The queue stores [`RenderableRef`] handles only. It owns nothing, and a
//! handle whose object was destroyed mid-frame simply fails to resolve.

use crate::core::{EngineError, EngineResult};
use crate::foundation::bounds::AABB;
use crate::foundation::math::Vec3;
use crate::scene::SceneObjectId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Draw-order / blending category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderBucket {
    /// Sky and other backdrop geometry
    Background,
    /// Opaque geometry
    Opaque,
    /// Alpha blended geometry, always drawn back-to-front
    Transparent,
    /// Additive or otherwise order-insensitive blended geometry
    Translucent,
    /// Screen-space overlays such as sprites
    Overlay,
}

impl RenderBucket {
    /// All buckets in draw order
    pub const ALL: [RenderBucket; 5] = [
        RenderBucket::Background,
        RenderBucket::Opaque,
        RenderBucket::Transparent,
        RenderBucket::Translucent,
        RenderBucket::Overlay,
    ];

    /// Buckets filled by the main scene pass
    pub const MAIN_PASS: BucketMask = BucketMask::OPAQUE
        .union(BucketMask::TRANSPARENT)
        .union(BucketMask::TRANSLUCENT);

    /// Slot of this bucket inside the queue
    pub const fn index(self) -> usize {
        match self {
            Self::Background => 0,
            Self::Opaque => 1,
            Self::Transparent => 2,
            Self::Translucent => 3,
            Self::Overlay => 4,
        }
    }

    /// Mask bit of this bucket
    pub const fn mask(self) -> BucketMask {
        match self {
            Self::Background => BucketMask::BACKGROUND,
            Self::Opaque => BucketMask::OPAQUE,
            Self::Transparent => BucketMask::TRANSPARENT,
            Self::Translucent => BucketMask::TRANSLUCENT,
            Self::Overlay => BucketMask::OVERLAY,
        }
    }
}

impl FromStr for RenderBucket {
    type Err = EngineError;

    fn from_str(name: &str) -> EngineResult<Self> {
        RenderBucket::ALL
            .into_iter()
            .find(|bucket| format!("{bucket:?}").eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| EngineError::invalid_params(format!("undefined render queue bucket '{name}'")))
    }
}

bitflags! {
    /// Set of buckets
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BucketMask: u8 {
        /// Background bucket
        const BACKGROUND = 1 << 0;
        /// Opaque bucket
        const OPAQUE = 1 << 1;
        /// Transparent bucket
        const TRANSPARENT = 1 << 2;
        /// Translucent bucket
        const TRANSLUCENT = 1 << 3;
        /// Overlay bucket
        const OVERLAY = 1 << 4;
    }
}

/// Which buckets a queue update may fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketFilter {
    /// Buckets named by the filter
    pub mask: BucketMask,
    /// When true the named buckets are skipped instead of selected
    pub ignore: bool,
}

impl BucketFilter {
    /// Accept every bucket
    pub const ALL: BucketFilter = BucketFilter { mask: BucketMask::empty(), ignore: true };

    /// Accept only `mask`
    pub const fn only(mask: BucketMask) -> Self {
        Self { mask, ignore: false }
    }

    /// Accept everything except `mask`
    pub const fn except(mask: BucketMask) -> Self {
        Self { mask, ignore: true }
    }

    /// Whether items for `bucket` may be queued
    pub fn allows(&self, bucket: RenderBucket) -> bool {
        self.mask.contains(bucket.mask()) != self.ignore
    }
}

/// Sort-key policy chosen per frame or pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderOrder {
    /// Group by effect to minimize pipeline rebinds
    #[default]
    StateChange,
    /// Nearest first, reduces overdraw
    FrontToBack,
    /// Farthest first, required for alpha blending
    BackToFront,
}

impl RenderOrder {
    /// Sort key of an item in `bucket`
    ///
    /// The Transparent bucket is always keyed back-to-front.
    pub fn sort_key(self, bucket: RenderBucket, effect_id: u64, world_bounds: &AABB, camera_position: &Vec3) -> SortKey {
        let order = if bucket == RenderBucket::Transparent { RenderOrder::BackToFront } else { self };
        match order {
            RenderOrder::StateChange => SortKey::group(effect_id),
            RenderOrder::FrontToBack => SortKey::depth(world_bounds.nearest_distance(camera_position)),
            RenderOrder::BackToFront => SortKey::depth(-world_bounds.nearest_distance(camera_position)),
        }
    }
}

/// Ascending draw-order key, compared by `group` then `depth`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SortKey {
    /// Exact primary key, the effect id under [`RenderOrder::StateChange`]
    pub group: u64,
    /// Signed camera distance or z-order
    pub depth: f32,
}

impl SortKey {
    /// Key ordered by `group` alone
    pub const fn group(group: u64) -> Self {
        Self { group, depth: 0.0 }
    }

    /// Key ordered by `depth` alone
    pub const fn depth(depth: f32) -> Self {
        Self { group: 0, depth }
    }

    /// Total order over keys
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.group
            .cmp(&other.group)
            .then_with(|| self.depth.total_cmp(&other.depth))
    }
}

/// Generation-checked handle to something drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderableRef {
    /// Part `part` of an entity object
    SubEntity {
        /// Entity scene object
        object: SceneObjectId,
        /// Sub-entity index
        part: usize,
    },
    /// Sky box object
    Sky(SceneObjectId),
    /// Sprite object
    Sprite(SceneObjectId),
}

impl RenderableRef {
    /// Scene object backing this renderable
    pub fn object(&self) -> SceneObjectId {
        match *self {
            RenderableRef::SubEntity { object, .. } => object,
            RenderableRef::Sky(object) | RenderableRef::Sprite(object) => object,
        }
    }
}

/// One queued draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderQueueItem {
    /// What to draw
    pub renderable: RenderableRef,
    /// Ascending sort key
    pub sort_key: SortKey,
}

/// Five-bucket render queue
#[derive(Debug, Default)]
pub struct RenderQueue {
    buckets: [Vec<RenderQueueItem>; 5],
}

impl RenderQueue {
    /// Create an empty render queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to `bucket`
    pub fn add_to_queue(&mut self, item: RenderQueueItem, bucket: RenderBucket) {
        self.buckets[bucket.index()].push(item);
    }

    /// Items of `bucket`, sorted ascending by key when `sort` is set
    pub fn render_bucket(&mut self, bucket: RenderBucket, sort: bool) -> &[RenderQueueItem] {
        let items = &mut self.buckets[bucket.index()];
        if sort {
            items.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));
        }
        items
    }

    /// Items of `bucket` in insertion order (or last sort order)
    pub fn bucket(&self, bucket: RenderBucket) -> &[RenderQueueItem] {
        &self.buckets[bucket.index()]
    }

    /// Truncate one bucket
    pub fn clear_queue(&mut self, bucket: RenderBucket) {
        self.buckets[bucket.index()].clear();
    }

    /// Truncate every bucket named by `mask`
    pub fn clear_buckets(&mut self, mask: BucketMask) {
        for bucket in RenderBucket::ALL {
            if mask.contains(bucket.mask()) {
                self.clear_queue(bucket);
            }
        }
    }

    /// Truncate all buckets
    pub fn clear_all_queue(&mut self) {
        for items in &mut self.buckets {
            items.clear();
        }
    }

    /// Total number of queued items
    pub fn item_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn object_ids(count: usize) -> Vec<SceneObjectId> {
        let mut map = SlotMap::<SceneObjectId, ()>::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    fn item(object: SceneObjectId, depth: f32) -> RenderQueueItem {
        RenderQueueItem { renderable: RenderableRef::Sky(object), sort_key: SortKey::depth(depth) }
    }

    #[test]
    fn test_bucket_sorting_ascending() {
        let ids = object_ids(3);
        let mut queue = RenderQueue::new();
        queue.add_to_queue(item(ids[0], 3.0), RenderBucket::Opaque);
        queue.add_to_queue(item(ids[1], -1.0), RenderBucket::Opaque);
        queue.add_to_queue(item(ids[2], 2.0), RenderBucket::Opaque);

        assert_eq!(queue.bucket(RenderBucket::Opaque)[0].sort_key.depth, 3.0);
        let keys: Vec<f32> = queue
            .render_bucket(RenderBucket::Opaque, true)
            .iter()
            .map(|i| i.sort_key.depth)
            .collect();
        assert_eq!(keys, vec![-1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_clear_single_bucket() {
        let ids = object_ids(2);
        let mut queue = RenderQueue::new();
        queue.add_to_queue(item(ids[0], 0.0), RenderBucket::Background);
        queue.add_to_queue(item(ids[1], 0.0), RenderBucket::Overlay);

        queue.clear_queue(RenderBucket::Background);
        assert_eq!(queue.bucket(RenderBucket::Background).len(), 0);
        assert_eq!(queue.bucket(RenderBucket::Overlay).len(), 1);

        queue.clear_all_queue();
        assert_eq!(queue.item_count(), 0);
    }

    #[test]
    fn test_transparent_bucket_forces_back_to_front() {
        let camera = Vec3::zeros();
        let near = AABB::from_center_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(0.5));
        let far = AABB::from_center_extents(Vec3::new(0.0, 0.0, -50.0), Vec3::repeat(0.5));

        for order in [RenderOrder::StateChange, RenderOrder::FrontToBack, RenderOrder::BackToFront] {
            let near_key = order.sort_key(RenderBucket::Transparent, 1, &near, &camera);
            let far_key = order.sort_key(RenderBucket::Transparent, 1, &far, &camera);
            assert_eq!(far_key.total_cmp(&near_key), Ordering::Less, "{order:?} must sort far before near");
        }

        let near_key = RenderOrder::FrontToBack.sort_key(RenderBucket::Opaque, 1, &near, &camera);
        let far_key = RenderOrder::FrontToBack.sort_key(RenderBucket::Opaque, 1, &far, &camera);
        assert_eq!(near_key.total_cmp(&far_key), Ordering::Less);
    }

    #[test]
    fn test_transparent_volume_around_camera_draws_last() {
        let camera = Vec3::zeros();
        let around = AABB::from_center_extents(Vec3::new(0.0, 0.0, -1.0), Vec3::repeat(3.0));
        let ahead = AABB::from_center_extents(Vec3::new(0.0, 0.0, -2.5), Vec3::repeat(0.25));

        let around_key = RenderOrder::BackToFront.sort_key(RenderBucket::Transparent, 1, &around, &camera);
        let ahead_key = RenderOrder::BackToFront.sort_key(RenderBucket::Transparent, 1, &ahead, &camera);
        assert!(around_key.depth > 0.0);
        assert_eq!(ahead_key.total_cmp(&around_key), Ordering::Less);
    }

    #[test]
    fn test_state_change_keeps_large_effect_ids_apart() {
        let ids = object_ids(4);
        let bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(1.0));
        let mut queue = RenderQueue::new();
        for (object, effect) in ids.iter().zip([(1 << 24) + 1, 1 << 24, (1 << 24) + 1, 1 << 24]) {
            let sort_key = RenderOrder::StateChange.sort_key(RenderBucket::Opaque, effect, &bounds, &Vec3::zeros());
            queue.add_to_queue(RenderQueueItem { renderable: RenderableRef::Sky(*object), sort_key }, RenderBucket::Opaque);
        }

        let groups: Vec<u64> = queue
            .render_bucket(RenderBucket::Opaque, true)
            .iter()
            .map(|i| i.sort_key.group)
            .collect();
        assert_eq!(groups, vec![1 << 24, 1 << 24, (1 << 24) + 1, (1 << 24) + 1]);
    }

    #[test]
    fn test_bucket_filter() {
        let only_opaque = BucketFilter::only(BucketMask::OPAQUE);
        assert!(only_opaque.allows(RenderBucket::Opaque));
        assert!(!only_opaque.allows(RenderBucket::Transparent));

        let no_overlay = BucketFilter::except(BucketMask::OVERLAY);
        assert!(no_overlay.allows(RenderBucket::Opaque));
        assert!(!no_overlay.allows(RenderBucket::Overlay));

        assert!(RenderBucket::ALL.iter().all(|b| BucketFilter::ALL.allows(*b)));
    }

    #[test]
    fn test_bucket_from_str() {
        assert_eq!("transparent".parse::<RenderBucket>().unwrap(), RenderBucket::Transparent);
        assert_eq!(" Overlay ".parse::<RenderBucket>().unwrap(), RenderBucket::Overlay);
        let error = "Sideways".parse::<RenderBucket>().unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::InvalidParams);
    }
}
