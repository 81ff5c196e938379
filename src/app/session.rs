use serde::{Deserialize, Serialize};

use crate::api::{TrackId, UserId};

/// Signed-in listener. Presence gates user-count enrichment, play
/// registration, and the `client_id` query parameter on stream URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: UserId,
    pub client_id: String,
}

/// Process-wide playback session: the queue of track ids, the cursor into it,
/// the optional user session and the shuffle flag. Mutated only through
/// [`SessionAction`]s applied inside the coordinator loop, never in place.
///
/// Invariant: `current_index`, when present, references a valid queue
/// position; absence means nothing is queued up to play.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub queue: Vec<TrackId>,
    pub current_index: Option<usize>,
    pub user: Option<UserSession>,
    pub shuffle: bool,
}

/// The dispatched action set. Queue construction (set/append/clear) and
/// login/logout sit alongside the transport-facing cursor actions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    SetShuffle(bool),
    IncrementCurrentIndex,
    DecrementCurrentIndex,
    PopFrontOfQueue,
    SetQueue(Vec<TrackId>),
    AppendToQueue(Vec<TrackId>),
    ClearQueue,
    SetUser(UserSession),
    ClearUser,
}

impl SessionState {
    /// The track id the cursor currently names, if any.
    pub fn current_track_id(&self) -> Option<TrackId> {
        self.current_index.and_then(|i| self.queue.get(i).copied())
    }

    pub fn apply(&mut self, action: SessionAction) {
        match action {
            SessionAction::SetShuffle(shuffle) => self.shuffle = shuffle,
            SessionAction::IncrementCurrentIndex => {
                self.current_index = match self.current_index {
                    // Past the last position the queue is exhausted.
                    Some(i) if i + 1 < self.queue.len() => Some(i + 1),
                    Some(_) => None,
                    // "Next" on an idle non-empty queue starts at the head.
                    None if !self.queue.is_empty() => Some(0),
                    None => None,
                };
            }
            SessionAction::DecrementCurrentIndex => {
                // Clamped at the first track.
                self.current_index = self.current_index.map(|i| i.saturating_sub(1));
            }
            SessionAction::PopFrontOfQueue => {
                if self.queue.is_empty() {
                    return;
                }
                self.queue.remove(0);
                self.current_index = match self.current_index {
                    Some(0) if self.queue.is_empty() => None,
                    Some(0) => Some(0),
                    Some(i) => Some(i - 1),
                    None => None,
                };
            }
            SessionAction::SetQueue(ids) => {
                self.current_index = if ids.is_empty() { None } else { Some(0) };
                self.queue = ids;
            }
            SessionAction::AppendToQueue(ids) => self.queue.extend(ids),
            SessionAction::ClearQueue => {
                self.queue.clear();
                self.current_index = None;
            }
            SessionAction::SetUser(user) => self.user = Some(user),
            SessionAction::ClearUser => self.user = None,
        }
    }

    /// Playback-completion advance: drop the consumed prefix and point the
    /// cursor at the new head. `[5, 9, 2]` with the head playing becomes
    /// `[9, 2]` with 9 current.
    pub fn advance_after_end(&mut self) {
        let Some(i) = self.current_index else {
            return;
        };
        if self.queue.is_empty() {
            self.current_index = None;
            return;
        }
        let end = i.min(self.queue.len() - 1);
        self.queue.drain(..=end);
        self.current_index = if self.queue.is_empty() { None } else { Some(0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(queue: Vec<TrackId>, current_index: Option<usize>) -> SessionState {
        SessionState {
            queue,
            current_index,
            ..SessionState::default()
        }
    }

    #[test]
    fn increment_advances_then_exhausts() {
        let mut s = state(vec![5, 9, 2], Some(0));
        s.apply(SessionAction::IncrementCurrentIndex);
        assert_eq!(s.current_index, Some(1));
        assert_eq!(s.current_track_id(), Some(9));

        s.apply(SessionAction::IncrementCurrentIndex);
        s.apply(SessionAction::IncrementCurrentIndex);
        assert_eq!(s.current_index, None);
        assert_eq!(s.current_track_id(), None);
    }

    #[test]
    fn increment_on_idle_queue_starts_at_head() {
        let mut s = state(vec![5, 9], None);
        s.apply(SessionAction::IncrementCurrentIndex);
        assert_eq!(s.current_track_id(), Some(5));
    }

    #[test]
    fn decrement_clamps_at_zero() {
        let mut s = state(vec![5, 9], Some(0));
        s.apply(SessionAction::DecrementCurrentIndex);
        assert_eq!(s.current_index, Some(0));
        assert_eq!(s.current_track_id(), Some(5));
    }

    #[test]
    fn pop_front_at_head_promotes_next_track() {
        let mut s = state(vec![5, 9, 2], Some(0));
        s.apply(SessionAction::PopFrontOfQueue);
        assert_eq!(s.queue, vec![9, 2]);
        assert_eq!(s.current_track_id(), Some(9));
    }

    #[test]
    fn pop_front_behind_cursor_keeps_same_track_current() {
        let mut s = state(vec![5, 9, 2], Some(2));
        s.apply(SessionAction::PopFrontOfQueue);
        assert_eq!(s.queue, vec![9, 2]);
        assert_eq!(s.current_index, Some(1));
        assert_eq!(s.current_track_id(), Some(2));
    }

    #[test]
    fn pop_front_on_last_track_empties_cursor() {
        let mut s = state(vec![5], Some(0));
        s.apply(SessionAction::PopFrontOfQueue);
        assert!(s.queue.is_empty());
        assert_eq!(s.current_index, None);
    }

    #[test]
    fn set_queue_points_cursor_at_head() {
        let mut s = state(vec![1], Some(0));
        s.apply(SessionAction::SetQueue(vec![7, 8]));
        assert_eq!(s.current_track_id(), Some(7));

        s.apply(SessionAction::SetQueue(Vec::new()));
        assert_eq!(s.current_index, None);
    }

    #[test]
    fn append_leaves_cursor_untouched() {
        let mut s = state(vec![5], Some(0));
        s.apply(SessionAction::AppendToQueue(vec![9, 2]));
        assert_eq!(s.queue, vec![5, 9, 2]);
        assert_eq!(s.current_track_id(), Some(5));
    }

    #[test]
    fn ended_drops_consumed_prefix() {
        let mut s = state(vec![5, 9, 2], Some(0));
        s.advance_after_end();
        assert_eq!(s.queue, vec![9, 2]);
        assert_eq!(s.current_track_id(), Some(9));

        let mut s = state(vec![5, 9, 2], Some(1));
        s.advance_after_end();
        assert_eq!(s.queue, vec![2]);
        assert_eq!(s.current_track_id(), Some(2));
    }

    #[test]
    fn ended_on_last_track_goes_empty() {
        let mut s = state(vec![2], Some(0));
        s.advance_after_end();
        assert!(s.queue.is_empty());
        assert_eq!(s.current_index, None);
    }

    #[test]
    fn shuffle_flag_round_trips() {
        let mut s = SessionState::default();
        s.apply(SessionAction::SetShuffle(true));
        assert!(s.shuffle);
        s.apply(SessionAction::SetShuffle(false));
        assert!(!s.shuffle);
    }
}
