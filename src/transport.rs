//! Transport controls: buttons and shortcuts mapped onto engine commands.
//!
//! Nothing is predicted locally. Button glyphs come from what the engine
//! reports back through the playback mirror.

use tracing::debug;

use crate::engine::{EngineControl, EngineError, SeekMode};

pub const DEFAULT_SKIP_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    TogglePlay,
    Stop,
    SkipBack,
    SkipForward,
    ToggleMute,
    SetVolume(i64),
}

#[derive(Debug, Clone)]
pub struct Transport {
    skip_seconds: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_SECONDS)
    }
}

impl Transport {
    pub fn new(skip_seconds: f64) -> Self {
        Self {
            skip_seconds: skip_seconds.abs(),
        }
    }

    pub fn dispatch<E>(&self, engine: &E, command: TransportCommand) -> Result<(), EngineError>
    where
        E: EngineControl + ?Sized,
    {
        debug!(?command, "transport");
        match command {
            TransportCommand::TogglePlay => {
                let paused = read_flag(engine.pause())?;
                engine.set_pause(!paused)
            }
            TransportCommand::Stop => engine.stop(),
            TransportCommand::SkipBack => engine.seek(-self.skip_seconds, SeekMode::Relative),
            TransportCommand::SkipForward => engine.seek(self.skip_seconds, SeekMode::Relative),
            TransportCommand::ToggleMute => {
                let muted = read_flag(engine.mute())?;
                engine.set_mute(!muted)
            }
            TransportCommand::SetVolume(volume) => {
                let volume = volume.clamp(0, 100);
                engine.set_volume(volume)?;
                // Zero forces mute; raising the volume leaves mute alone.
                if volume == 0 {
                    engine.set_mute(true)?;
                }
                Ok(())
            }
        }
    }

    pub fn skip_seconds(&self) -> f64 {
        self.skip_seconds
    }
}

/// An unknown flag reads as false; real engine faults still propagate.
fn read_flag(value: Result<bool, EngineError>) -> Result<bool, EngineError> {
    match value {
        Ok(flag) => Ok(flag),
        Err(err) if err.is_transient() => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::engine::EngineCommand;

    #[test]
    fn toggle_play_inverts_engine_pause() {
        let engine = FakeEngine::default();
        let transport = Transport::default();

        engine.properties.borrow_mut().pause = Some(true);
        transport.dispatch(&engine, TransportCommand::TogglePlay).unwrap();
        engine.properties.borrow_mut().pause = Some(false);
        transport.dispatch(&engine, TransportCommand::TogglePlay).unwrap();

        assert_eq!(
            engine.commands(),
            vec![EngineCommand::SetPause(false), EngineCommand::SetPause(true)]
        );
    }

    #[test]
    fn unknown_pause_state_pauses() {
        let engine = FakeEngine::default();
        Transport::default()
            .dispatch(&engine, TransportCommand::TogglePlay)
            .unwrap();
        assert_eq!(engine.commands(), vec![EngineCommand::SetPause(true)]);
    }

    #[test]
    fn skips_are_relative_seeks() {
        let engine = FakeEngine::default();
        let transport = Transport::new(10.0);
        transport.dispatch(&engine, TransportCommand::SkipBack).unwrap();
        transport.dispatch(&engine, TransportCommand::SkipForward).unwrap();

        assert_eq!(
            engine.commands(),
            vec![
                EngineCommand::Seek {
                    offset: -10.0,
                    mode: SeekMode::Relative
                },
                EngineCommand::Seek {
                    offset: 10.0,
                    mode: SeekMode::Relative
                },
            ]
        );
    }

    #[test]
    fn zero_volume_forces_mute() {
        let engine = FakeEngine::default();
        Transport::default()
            .dispatch(&engine, TransportCommand::SetVolume(0))
            .unwrap();
        assert_eq!(
            engine.commands(),
            vec![EngineCommand::SetVolume(0), EngineCommand::SetMute(true)]
        );
    }

    #[test]
    fn raising_volume_does_not_unmute() {
        let engine = FakeEngine::default();
        engine.properties.borrow_mut().mute = Some(true);
        Transport::default()
            .dispatch(&engine, TransportCommand::SetVolume(35))
            .unwrap();
        assert_eq!(engine.commands(), vec![EngineCommand::SetVolume(35)]);
    }

    #[test]
    fn mute_toggle_flips_engine_state() {
        let engine = FakeEngine::default();
        engine.properties.borrow_mut().mute = Some(true);
        Transport::default()
            .dispatch(&engine, TransportCommand::ToggleMute)
            .unwrap();
        assert_eq!(engine.commands(), vec![EngineCommand::SetMute(false)]);
    }

    #[test]
    fn dead_engine_errors_propagate() {
        let engine = FakeEngine::default();
        engine.fail_reads_with(|| EngineError::Terminated);
        let err = Transport::default()
            .dispatch(&engine, TransportCommand::TogglePlay)
            .unwrap_err();
        assert!(matches!(err, EngineError::Terminated));
        assert!(engine.commands().is_empty());
    }

    #[test]
    fn stop_is_forwarded() {
        let engine = FakeEngine::default();
        Transport::default()
            .dispatch(&engine, TransportCommand::Stop)
            .unwrap();
        assert_eq!(engine.commands(), vec![EngineCommand::Stop]);
    }
}
