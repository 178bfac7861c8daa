#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Ended,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStateChange {
    pub from: PlaybackState,
    pub to: PlaybackState,
}

pub struct PlaybackSM {
    state: PlaybackState,
}

impl Default for PlaybackSM {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSM {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
        }
    }

    pub fn current(&self) -> PlaybackState {
        self.state
    }

    /// Frames may be rendered while playing, and re-rendered while paused.
    pub fn can_render(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    pub fn on_load(&mut self) -> Option<PlaybackStateChange> {
        match self.state {
            PlaybackState::Destroyed => None,
            _ => self.goto(PlaybackState::Loaded),
        }
    }

    pub fn on_play(&mut self) -> Option<PlaybackStateChange> {
        match self.state {
            PlaybackState::Loaded | PlaybackState::Paused => self.goto(PlaybackState::Playing),
            _ => None,
        }
    }

    pub fn on_pause(&mut self) -> Option<PlaybackStateChange> {
        match self.state {
            PlaybackState::Playing => self.goto(PlaybackState::Paused),
            _ => None,
        }
    }

    pub fn on_end(&mut self) -> Option<PlaybackStateChange> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => self.goto(PlaybackState::Ended),
            _ => None,
        }
    }

    pub fn on_destroy(&mut self) -> Option<PlaybackStateChange> {
        self.goto(PlaybackState::Destroyed)
    }

    fn goto(&mut self, to: PlaybackState) -> Option<PlaybackStateChange> {
        if self.state == to {
            return None;
        }
        let ch = PlaybackStateChange {
            from: self.state,
            to,
        };
        self.state = to;
        Some(ch)
    }
}
