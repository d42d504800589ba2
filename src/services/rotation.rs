use crate::models::{ContentItem, ContentKind, Playlist, PlaylistItem};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

/// One entry of the rotation ring with its effective display duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedItem {
    pub content_id: i32,
    pub duration_secs: i64,
}

/// The slot a device should be showing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub index: usize,
    pub content_id: i32,
    pub started_at: NaiveDateTime,
    pub duration_secs: i64,
}

/// Builds the ring for a playlist. Videos use their intrinsic duration,
/// images use their per-item override or the playlist default. Items with no
/// positive duration or a missing content record drop out of the ring.
pub fn resolve_items(
    playlist: &Playlist,
    items: &[PlaylistItem],
    content: &[ContentItem],
) -> Vec<ResolvedItem> {
    let by_id: HashMap<i32, &ContentItem> = content.iter().map(|c| (c.id, c)).collect();

    let mut ordered: Vec<&PlaylistItem> = items.iter().collect();
    ordered.sort_by_key(|i| i.position);

    ordered
        .into_iter()
        .filter_map(|item| {
            let record = by_id.get(&item.content_id)?;
            let duration = match record.content_kind() {
                ContentKind::Video => record
                    .duration_secs
                    .or(item.duration_secs)
                    .unwrap_or(playlist.default_item_duration_secs),
                ContentKind::Image => item
                    .duration_secs
                    .unwrap_or(playlist.default_item_duration_secs),
            } as i64;

            if duration <= 0 {
                return None;
            }

            Some(ResolvedItem {
                content_id: item.content_id,
                duration_secs: duration,
            })
        })
        .collect()
}

pub fn cycle_length(items: &[ResolvedItem]) -> i64 {
    items.iter().map(|i| i.duration_secs).sum()
}

/// Locates the slot containing `now`, given elapsed time since `epoch` modulo
/// the cycle length. An empty ring has no slot (the device idles).
pub fn current_slot(
    items: &[ResolvedItem],
    now: NaiveDateTime,
    epoch: NaiveDateTime,
) -> Option<Slot> {
    let cycle = cycle_length(items);
    if cycle == 0 {
        return None;
    }

    let elapsed = (now - epoch).num_seconds();
    let offset = elapsed.rem_euclid(cycle);
    let cycle_start = epoch + Duration::seconds(elapsed.div_euclid(cycle) * cycle);

    let mut acc = 0i64;
    for (index, item) in items.iter().enumerate() {
        if offset < acc + item.duration_secs {
            return Some(Slot {
                index,
                content_id: item.content_id,
                started_at: cycle_start + Duration::seconds(acc),
                duration_secs: item.duration_secs,
            });
        }
        acc += item.duration_secs;
    }

    None
}

/// Lazy infinite sequence of consecutive slots starting at `epoch`. Restart
/// means constructing a new iterator with a new epoch.
pub fn slots(items: Vec<ResolvedItem>, epoch: NaiveDateTime) -> impl Iterator<Item = Slot> {
    let mut index = 0usize;
    let mut started_at = epoch;
    std::iter::from_fn(move || {
        if items.is_empty() {
            return None;
        }
        let item = items[index % items.len()];
        let slot = Slot {
            index: index % items.len(),
            content_id: item.content_id,
            started_at,
            duration_secs: item.duration_secs,
        };
        index += 1;
        started_at += Duration::seconds(item.duration_secs);
        Some(slot)
    })
}

#[derive(Debug, Clone)]
struct PendingPlan {
    items: Vec<ResolvedItem>,
    epoch: NaiveDateTime,
}

/// Per-device rotation state for one active playlist.
///
/// Item-list edits are staged and committed at the next cycle boundary of the
/// running plan, so the item on screen is never cut short. Switching to a
/// different playlist or a device reboot constructs a fresh `Rotation`.
#[derive(Debug, Clone)]
pub struct Rotation {
    playlist_id: i32,
    items: Vec<ResolvedItem>,
    epoch: NaiveDateTime,
    pending: Option<PendingPlan>,
}

impl Rotation {
    pub fn new(playlist_id: i32, items: Vec<ResolvedItem>, epoch: NaiveDateTime) -> Self {
        Self {
            playlist_id,
            items,
            epoch,
            pending: None,
        }
    }

    pub fn playlist_id(&self) -> i32 {
        self.playlist_id
    }

    /// The plan the ring is converging on: the staged items if an edit is
    /// pending, otherwise the running items.
    pub fn planned_items(&self) -> &[ResolvedItem] {
        match &self.pending {
            Some(p) => &p.items,
            None => &self.items,
        }
    }

    /// Stages a new item list, to take effect at the next cycle boundary of
    /// the running plan. An empty running plan switches over immediately.
    pub fn replace_items(&mut self, items: Vec<ResolvedItem>, now: NaiveDateTime) {
        if self.planned_items() == items.as_slice() {
            return;
        }

        let cycle = cycle_length(&self.items);
        let boundary = if cycle == 0 {
            now
        } else {
            let elapsed = (now - self.epoch).num_seconds();
            self.epoch + Duration::seconds((elapsed.div_euclid(cycle) + 1) * cycle)
        };

        self.pending = Some(PendingPlan {
            items,
            epoch: boundary,
        });
    }

    pub fn slot_at(&mut self, now: NaiveDateTime) -> Option<Slot> {
        if let Some(pending) = &self.pending {
            if now >= pending.epoch {
                let pending = self.pending.take().unwrap();
                self.items = pending.items;
                self.epoch = pending.epoch;
            }
        }

        current_slot(&self.items, now, self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RECURRENCE_WEEKDAY;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn item(content_id: i32, duration_secs: i64) -> ResolvedItem {
        ResolvedItem {
            content_id,
            duration_secs,
        }
    }

    fn playlist(default_secs: i32) -> Playlist {
        Playlist {
            id: 1,
            account_id: 1,
            name: "test".to_string(),
            recurrence_kind: RECURRENCE_WEEKDAY.to_string(),
            day_of_week: Some(0),
            event_start: None,
            event_end: None,
            default_item_duration_secs: default_secs,
            is_enabled: true,
            created_at: dt(0, 0, 0),
            updated_at: dt(0, 0, 0),
        }
    }

    fn playlist_item(id: i32, content_id: i32, position: i32, duration: Option<i32>) -> PlaylistItem {
        PlaylistItem {
            id,
            playlist_id: 1,
            content_id,
            position,
            duration_secs: duration,
            created_at: dt(0, 0, 0),
        }
    }

    fn content(id: i32, kind: &str, duration: Option<i32>) -> ContentItem {
        ContentItem {
            id,
            account_id: 1,
            title: format!("content-{}", id),
            kind: kind.to_string(),
            byte_size: 1024,
            storage_path: format!("media/{}.bin", id),
            duration_secs: duration,
            created_at: dt(0, 0, 0),
            updated_at: dt(0, 0, 0),
        }
    }

    #[test]
    fn offset_locates_first_item_in_ring() {
        // 3 items, 5s each, cycle 15s; epoch+32s -> offset 2 -> first item.
        let items = vec![item(1, 5), item(2, 5), item(3, 5)];
        let epoch = dt(9, 0, 0);
        let now = epoch + Duration::seconds(32);

        let slot = current_slot(&items, now, epoch).unwrap();
        assert_eq!(slot.index, 0);
        assert_eq!(slot.content_id, 1);
        // Current cycle started at epoch + 30s, so the slot started there too.
        assert_eq!(slot.started_at, epoch + Duration::seconds(30));
        assert_eq!(slot.duration_secs, 5);
    }

    #[test]
    fn rotation_is_periodic_in_cycle_length() {
        let items = vec![item(1, 5), item(2, 7), item(3, 3)];
        let cycle = cycle_length(&items);
        assert_eq!(cycle, 15);

        let epoch = dt(9, 0, 0);
        for secs in [0, 4, 5, 11, 12, 14, 31] {
            let now = epoch + Duration::seconds(secs);
            let a = current_slot(&items, now, epoch).unwrap();
            let b = current_slot(&items, now + Duration::seconds(cycle), epoch).unwrap();
            assert_eq!(a.index, b.index);
            assert_eq!(a.content_id, b.content_id);
            assert_eq!(a.duration_secs, b.duration_secs);
            assert_eq!(b.started_at - a.started_at, Duration::seconds(cycle));
        }
    }

    #[test]
    fn empty_ring_yields_no_slot() {
        assert!(current_slot(&[], dt(10, 0, 0), dt(9, 0, 0)).is_none());
        assert_eq!(slots(vec![], dt(9, 0, 0)).next(), None);
    }

    #[test]
    fn video_uses_intrinsic_duration_image_falls_back_to_default() {
        let playlist = playlist(10);
        let items = vec![
            playlist_item(1, 1, 0, None),    // image, no override -> 10
            playlist_item(2, 2, 1, Some(4)), // image, override -> 4
            playlist_item(3, 3, 2, Some(4)), // video, intrinsic 30 wins -> 30
            playlist_item(4, 4, 3, None),    // video, no intrinsic -> default 10
        ];
        let content = vec![
            content(1, "image", None),
            content(2, "image", None),
            content(3, "video", Some(30)),
            content(4, "video", None),
        ];

        let resolved = resolve_items(&playlist, &items, &content);
        let durations: Vec<i64> = resolved.iter().map(|i| i.duration_secs).collect();
        assert_eq!(durations, vec![10, 4, 30, 10]);
    }

    #[test]
    fn items_ordered_by_position_and_dangling_refs_skipped() {
        let playlist = playlist(10);
        let items = vec![
            playlist_item(1, 2, 1, None),
            playlist_item(2, 1, 0, None),
            playlist_item(3, 99, 2, None), // no content record
        ];
        let content = vec![content(1, "image", None), content(2, "image", None)];

        let resolved = resolve_items(&playlist, &items, &content);
        let ids: Vec<i32> = resolved.iter().map(|i| i.content_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn slots_iterator_is_consecutive_and_wraps() {
        let epoch = dt(9, 0, 0);
        let ring = vec![item(1, 5), item(2, 7)];
        let first_four: Vec<Slot> = slots(ring, epoch).take(4).collect();

        assert_eq!(first_four[0].content_id, 1);
        assert_eq!(first_four[0].started_at, epoch);
        assert_eq!(first_four[1].content_id, 2);
        assert_eq!(first_four[1].started_at, epoch + Duration::seconds(5));
        assert_eq!(first_four[2].content_id, 1);
        assert_eq!(first_four[2].started_at, epoch + Duration::seconds(12));
        assert_eq!(first_four[3].started_at, epoch + Duration::seconds(17));
    }

    #[test]
    fn item_edit_commits_at_next_cycle_boundary_never_mid_item() {
        let epoch = dt(9, 0, 0);
        let mut rotation = Rotation::new(1, vec![item(1, 5), item(2, 5)], epoch);

        // Edit lands mid-cycle, mid-item.
        rotation.replace_items(vec![item(3, 20)], epoch + Duration::seconds(7));

        // Still the old ring until the 10s boundary.
        let before = rotation.slot_at(epoch + Duration::seconds(8)).unwrap();
        assert_eq!(before.content_id, 2);

        // At the boundary the new ring starts from its first item.
        let after = rotation.slot_at(epoch + Duration::seconds(10)).unwrap();
        assert_eq!(after.content_id, 3);
        assert_eq!(after.started_at, epoch + Duration::seconds(10));

        // And the new epoch is the boundary, not the original epoch.
        let later = rotation.slot_at(epoch + Duration::seconds(29)).unwrap();
        assert_eq!(later.started_at, epoch + Duration::seconds(10));
    }

    #[test]
    fn replacing_with_identical_plan_is_a_no_op() {
        let epoch = dt(9, 0, 0);
        let ring = vec![item(1, 5), item(2, 5)];
        let mut rotation = Rotation::new(1, ring.clone(), epoch);

        rotation.replace_items(ring, epoch + Duration::seconds(3));

        // Epoch unchanged: slot 90s in still derives from the original epoch.
        let slot = rotation.slot_at(epoch + Duration::seconds(93)).unwrap();
        assert_eq!(slot.started_at, epoch + Duration::seconds(90));
    }

    #[test]
    fn edit_of_empty_ring_takes_effect_immediately() {
        let epoch = dt(9, 0, 0);
        let mut rotation = Rotation::new(1, vec![], epoch);
        assert!(rotation.slot_at(epoch + Duration::seconds(5)).is_none());

        let now = epoch + Duration::seconds(8);
        rotation.replace_items(vec![item(1, 5)], now);

        let slot = rotation.slot_at(now).unwrap();
        assert_eq!(slot.content_id, 1);
        assert_eq!(slot.started_at, now);
    }
}
