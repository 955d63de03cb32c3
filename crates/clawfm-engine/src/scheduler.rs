use crate::playlist::Playlist;

/// Index that follows `current` in a playlist of `len` tracks, wrapping to 0.
pub fn next_index(current: usize, len: usize) -> usize {
    debug_assert!(len > 0, "playlists are never empty");
    (current + 1) % len.max(1)
}

/// Owns the current position in the playlist.
#[derive(Debug, Clone, Default)]
pub struct TrackScheduler {
    current: usize,
}

impl TrackScheduler {
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move forward one track and return the new index.
    pub fn advance(&mut self, playlist: &Playlist) -> usize {
        self.current = next_index(self.current, playlist.len());
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawfm_proto::protocol::Track;
    use proptest::prelude::*;

    fn playlist(len: usize) -> Playlist {
        let tracks = (0..len)
            .map(|i| Track {
                title: format!("t{i}"),
                artist: String::new(),
                genre: String::new(),
                url: String::new(),
                frequency: String::new(),
                is_agent: false,
            })
            .collect();
        Playlist::new(tracks).unwrap()
    }

    #[test]
    fn test_advance_wraps_to_start() {
        let list = playlist(3);
        let mut scheduler = TrackScheduler::default();
        assert_eq!(scheduler.advance(&list), 1);
        assert_eq!(scheduler.advance(&list), 2);
        assert_eq!(scheduler.advance(&list), 0);
    }

    #[test]
    fn test_single_track_stays_put() {
        let list = playlist(1);
        let mut scheduler = TrackScheduler::default();
        assert_eq!(scheduler.advance(&list), 0);
        assert_eq!(scheduler.advance(&list), 0);
    }

    proptest! {
        #[test]
        fn prop_next_index_is_cyclic(len in 1usize..10_000, offset in 0usize..10_000) {
            let current = offset % len;
            let next = next_index(current, len);
            prop_assert_eq!(next, (current + 1) % len);
            prop_assert!(next < len);
        }
    }
}
