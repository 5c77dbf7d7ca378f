use std::fmt;

use crate::playback::clock::FramePair;

/// Lifecycle of one player instance.
///
/// `Idle -> Analyzing -> Ready`, with `Failed` reachable from `Analyzing` (load, decode or
/// timeout) and from construction (no usable surface). Assigning a new source always
/// returns to `Analyzing` unless the surface itself is unavailable.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Analyzing,
    Ready,
    Failed(String),
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::Analyzing => f.write_str("ANALYZING"),
            Self::Ready => f.write_str("READY"),
            Self::Failed(reason) => write!(f, "FAILED ({reason})"),
        }
    }
}

/// What one [`SpritePlayer::tick`](crate::SpritePlayer::tick) did.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    Idle,
    Analyzing { analysed: usize, total: usize },
    Drawn(FramePair),
    Failed,
}

/// Observational readout for HUD overlays. Nothing in the engine reads it back.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Diagnostics {
    pub state: EngineState,
    /// 1-based index of the frame drawn at full opacity on the last tick.
    pub active_frame: Option<usize>,
    pub total_frames: usize,
    pub stability: Option<f64>,
    pub smoothing_active: bool,
    pub speed: f64,
    pub playing: bool,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if let Some(active) = self.active_frame {
            write!(f, " frame {active}/{}", self.total_frames)?;
        }
        if let Some(stability) = self.stability {
            write!(f, " stability {stability:.1}")?;
        }
        write!(
            f,
            " smoothing {} speed {:.2}x{}",
            if self.smoothing_active { "on" } else { "off" },
            self.speed,
            if self.playing { "" } else { " (paused)" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_with_reason() {
        let json = serde_json::to_string(&EngineState::Failed("decode".into())).unwrap();
        assert_eq!(json, r#"{"state":"failed","reason":"decode"}"#);
        let json = serde_json::to_string(&EngineState::Ready).unwrap();
        assert_eq!(json, r#"{"state":"ready"}"#);
    }

    #[test]
    fn diagnostics_display_is_compact() {
        let d = Diagnostics {
            state: EngineState::Ready,
            active_frame: Some(8),
            total_frames: 16,
            stability: Some(52.0),
            smoothing_active: true,
            speed: 1.0,
            playing: false,
        };
        assert_eq!(
            d.to_string(),
            "READY frame 8/16 stability 52.0 smoothing on speed 1.00x (paused)"
        );
    }
}
