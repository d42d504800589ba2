use crate::models::{Playlist, Recurrence};
use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

/// A playlist that could not participate in resolution because its stored
/// recurrence is malformed. Surfaced to the dashboard, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleWarning {
    pub playlist_id: i32,
    pub playlist_name: String,
    pub problem: String,
}

#[derive(Debug)]
pub struct Resolution<'a> {
    pub active: Option<&'a Playlist>,
    pub warnings: Vec<ScheduleWarning>,
}

/// Resolves which playlist is active at `now` for one account's snapshot.
///
/// Event playlists whose [start, end] range contains `now` outrank weekday
/// playlists regardless of list order. Within either group the most recently
/// updated playlist wins; equal timestamps fall back to the highest id so the
/// result stays deterministic. No match is the idle state, not an error.
///
/// Pure over its inputs; callers re-evaluate when `now` crosses a boundary or
/// the playlist set changes.
pub fn resolve_active_playlist<'a>(
    playlists: &'a [Playlist],
    now: NaiveDateTime,
) -> Resolution<'a> {
    let mut warnings = Vec::new();
    let mut best_event: Option<&Playlist> = None;
    let mut best_weekday: Option<&Playlist> = None;

    // Monday = 0, matching the stored day_of_week indices.
    let today = now.weekday();

    for playlist in playlists {
        if !playlist.is_enabled {
            continue;
        }

        let recurrence = match playlist.recurrence() {
            Ok(r) => r,
            Err(e) => {
                warnings.push(ScheduleWarning {
                    playlist_id: playlist.id,
                    playlist_name: playlist.name.clone(),
                    problem: e.to_string(),
                });
                continue;
            }
        };

        match recurrence {
            Recurrence::Event { start, end } => {
                if start <= now && now <= end {
                    best_event = Some(pick_winner(best_event, playlist));
                }
            }
            Recurrence::Weekday(day) => {
                if day == today {
                    best_weekday = Some(pick_winner(best_weekday, playlist));
                }
            }
        }
    }

    Resolution {
        active: best_event.or(best_weekday),
        warnings,
    }
}

fn pick_winner<'a>(current: Option<&'a Playlist>, candidate: &'a Playlist) -> &'a Playlist {
    match current {
        None => candidate,
        Some(held) => {
            if (candidate.updated_at, candidate.id) > (held.updated_at, held.id) {
                candidate
            } else {
                held
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RECURRENCE_EVENT, RECURRENCE_WEEKDAY};
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn weekday_playlist(id: i32, day: i32, updated_at: NaiveDateTime) -> Playlist {
        Playlist {
            id,
            account_id: 1,
            name: format!("weekday-{}", id),
            recurrence_kind: RECURRENCE_WEEKDAY.to_string(),
            day_of_week: Some(day),
            event_start: None,
            event_end: None,
            default_item_duration_secs: 10,
            is_enabled: true,
            created_at: updated_at,
            updated_at,
        }
    }

    fn event_playlist(
        id: i32,
        start: NaiveDateTime,
        end: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> Playlist {
        Playlist {
            id,
            account_id: 1,
            name: format!("event-{}", id),
            recurrence_kind: RECURRENCE_EVENT.to_string(),
            day_of_week: None,
            event_start: Some(start),
            event_end: Some(end),
            default_item_duration_secs: 10,
            is_enabled: true,
            created_at: updated_at,
            updated_at,
        }
    }

    // 2026-08-24 is a Monday.
    const MONDAY: (i32, u32, u32) = (2026, 8, 24);

    #[test]
    fn weekday_playlist_matches_its_day() {
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let playlists = vec![
            weekday_playlist(1, 0, dt(2026, 8, 1, 0, 0)), // Monday
            weekday_playlist(2, 1, dt(2026, 8, 1, 0, 0)), // Tuesday
        ];

        let resolution = resolve_active_playlist(&playlists, now);
        assert_eq!(resolution.active.unwrap().id, 1);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn event_outranks_weekday_regardless_of_order() {
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let playlists = vec![
            // Weekday playlist updated far more recently than the event.
            weekday_playlist(1, 0, dt(2026, 8, 24, 11, 0)),
            event_playlist(
                2,
                dt(2026, 8, 20, 0, 0),
                dt(2026, 8, 30, 0, 0),
                dt(2026, 8, 1, 0, 0),
            ),
        ];

        let resolution = resolve_active_playlist(&playlists, now);
        assert_eq!(resolution.active.unwrap().id, 2);
    }

    #[test]
    fn overlapping_events_most_recently_updated_wins() {
        let now = dt(2026, 8, 24, 12, 0);
        let playlists = vec![
            event_playlist(
                1,
                dt(2026, 8, 20, 0, 0),
                dt(2026, 8, 30, 0, 0),
                dt(2026, 8, 10, 0, 0),
            ),
            event_playlist(
                2,
                dt(2026, 8, 22, 0, 0),
                dt(2026, 8, 26, 0, 0),
                dt(2026, 8, 15, 0, 0),
            ),
        ];

        let resolution = resolve_active_playlist(&playlists, now);
        assert_eq!(resolution.active.unwrap().id, 2);
    }

    #[test]
    fn equal_update_times_break_by_highest_id() {
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let updated = dt(2026, 8, 1, 0, 0);
        let playlists = vec![
            weekday_playlist(3, 0, updated),
            weekday_playlist(7, 0, updated),
            weekday_playlist(5, 0, updated),
        ];

        let resolution = resolve_active_playlist(&playlists, now);
        assert_eq!(resolution.active.unwrap().id, 7);
    }

    #[test]
    fn no_match_is_idle_not_error() {
        // Tuesday-only playlist evaluated on a Monday, plus an expired event.
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let playlists = vec![
            weekday_playlist(1, 1, dt(2026, 8, 1, 0, 0)),
            event_playlist(
                2,
                dt(2026, 8, 1, 0, 0),
                dt(2026, 8, 2, 0, 0),
                dt(2026, 8, 1, 0, 0),
            ),
        ];

        let resolution = resolve_active_playlist(&playlists, now);
        assert!(resolution.active.is_none());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn event_range_is_inclusive_at_both_ends() {
        let start = dt(2026, 8, 24, 9, 0);
        let end = dt(2026, 8, 24, 17, 0);
        let playlists = vec![event_playlist(1, start, end, dt(2026, 8, 1, 0, 0))];

        assert!(resolve_active_playlist(&playlists, start).active.is_some());
        assert!(resolve_active_playlist(&playlists, end).active.is_some());
        assert!(resolve_active_playlist(&playlists, end + chrono::Duration::seconds(1))
            .active
            .is_none());
    }

    #[test]
    fn disabled_playlists_never_resolve() {
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let mut playlist = weekday_playlist(1, 0, dt(2026, 8, 1, 0, 0));
        playlist.is_enabled = false;

        let playlists = [playlist];
        let resolution = resolve_active_playlist(&playlists, now);
        assert!(resolution.active.is_none());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn malformed_recurrence_is_excluded_with_warning() {
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let mut broken = weekday_playlist(9, 0, dt(2026, 8, 1, 0, 0));
        broken.day_of_week = None;
        let playlists = vec![broken, weekday_playlist(1, 0, dt(2026, 7, 1, 0, 0))];

        let resolution = resolve_active_playlist(&playlists, now);
        assert_eq!(resolution.active.unwrap().id, 1);
        assert_eq!(resolution.warnings.len(), 1);
        assert_eq!(resolution.warnings[0].playlist_id, 9);
    }

    #[test]
    fn at_most_one_playlist_survives_tie_break() {
        let now = dt(MONDAY.0, MONDAY.1, MONDAY.2, 12, 0);
        let playlists: Vec<Playlist> = (1..=10)
            .map(|i| weekday_playlist(i, 0, dt(2026, 8, 1, 0, i as u32)))
            .collect();

        let resolution = resolve_active_playlist(&playlists, now);
        // Exactly one winner: the most recently updated.
        assert_eq!(resolution.active.unwrap().id, 10);
    }
}
