use std::{
    f64::consts::TAU,
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
};

use rodio::{buffer::SamplesBuffer, Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

use crate::config::{AlarmConfig, AlarmStrategy};

pub const SAMPLE_RATE: u32 = 44_100;
pub const TONE_DURATION_MS: u32 = 100;
pub const TONE_FREQUENCY: f32 = 1000.0;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm player command `{0}` is empty or malformed")]
    BadCommand(String),
    #[error("couldn't run alarm player `{program}`: {source}")]
    PlayerFailed {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("alarm player `{program}` exited with {status}")]
    PlayerExited { program: String, status: ExitStatus },
    #[error("couldn't open sound file {}: {source}", .path.display())]
    SoundFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't decode sound file: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
    #[error("no audio output device: {0}")]
    Device(#[from] rodio::StreamError),
    #[error("couldn't play on audio output: {0}")]
    Playback(#[from] rodio::PlayError),
}

/// something that can make the alarm go off
///
/// `volume` is a percentage, anything above 100 is treated as 100
pub trait AlarmEmitter {
    /// plays the alarm once, returning when it is done
    ///
    /// # Errors
    /// if the alarm couldn't be played
    fn emit(&mut self, volume: u8) -> Result<(), AlarmError>;
}

/// builds the emitter for the configured strategy
#[must_use]
pub fn emitter(config: &AlarmConfig) -> Box<dyn AlarmEmitter> {
    match config.strategy {
        AlarmStrategy::External => Box::new(ExternalPlayer::new(
            config.player.clone(),
            config.sound.clone(),
        )),
        AlarmStrategy::SoundFile => Box::new(SoundFile::new(config.sound.clone())),
        AlarmStrategy::Tone => Box::new(Tone::new(
            config.sample_rate,
            config.duration_ms,
            config.frequency,
        )),
    }
}

/// generates `sample_rate * duration_ms / 1000` mono samples of a sine wave
/// with an amplitude of `volume / 100`
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn synthesize(sample_rate: u32, duration_ms: u32, frequency: f32, volume: u8) -> Vec<f32> {
    let count = u64::from(sample_rate) * u64::from(duration_ms) / 1000;
    let amplitude = f64::from(volume.min(100)) / 100.0;
    let step = TAU * f64::from(frequency) / f64::from(sample_rate);
    (0..count)
        .map(|i| (amplitude * (step * i as f64).sin()) as f32)
        .collect()
}

fn volume_scale(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}

/// uses the resource in `slot`, opening it first if needed
///
/// a resource that fails to be used is dropped so the next call opens a fresh one
fn with_reopen<T, R, E>(
    slot: &mut Option<T>,
    open: impl FnOnce() -> Result<T, E>,
    use_it: impl FnOnce(&T) -> Result<R, E>,
) -> Result<R, E> {
    let resource = match slot.take() {
        Some(resource) => resource,
        None => open()?,
    };
    let result = use_it(slot.insert(resource));
    if result.is_err() {
        *slot = None;
    }
    result
}

/// the default output stream, opened on first use and kept open after
#[derive(Default)]
struct Output {
    stream: Option<(OutputStream, OutputStreamHandle)>,
}

impl Output {
    fn sink(&mut self) -> Result<Sink, AlarmError> {
        with_reopen(
            &mut self.stream,
            || Ok(OutputStream::try_default()?),
            |(_, handle)| Ok(Sink::try_new(handle)?),
        )
    }
}

/// runs an external program (`aplay` by default) with the sound file as its last argument
#[derive(Debug, Clone)]
pub struct ExternalPlayer {
    command: String,
    sound: PathBuf,
}

impl ExternalPlayer {
    #[must_use]
    pub const fn new(command: String, sound: PathBuf) -> Self {
        Self { command, sound }
    }

    fn command(&self) -> Result<Command, AlarmError> {
        let bad_command = || AlarmError::BadCommand(self.command.clone());
        let words = shlex::split(&self.command).ok_or_else(bad_command)?;
        let (program, args) = words.split_first().ok_or_else(bad_command)?;
        let mut command = Command::new(program);
        command
            .args(args)
            .arg(&self.sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        Ok(command)
    }
}

impl AlarmEmitter for ExternalPlayer {
    /// the player decides on its own volume
    fn emit(&mut self, _volume: u8) -> Result<(), AlarmError> {
        let mut command = self.command()?;
        let program = command.get_program().to_string_lossy().into_owned();
        log::debug!("running {command:?}");
        let status = command
            .status()
            .map_err(|source| AlarmError::PlayerFailed {
                program: program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(AlarmError::PlayerExited { program, status })
        }
    }
}

/// decodes and plays a sound file (anything rodio can decode)
pub struct SoundFile {
    path: PathBuf,
    output: Output,
}

impl SoundFile {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            output: Output::default(),
        }
    }
}

impl AlarmEmitter for SoundFile {
    fn emit(&mut self, volume: u8) -> Result<(), AlarmError> {
        let file = File::open(&self.path).map_err(|source| AlarmError::SoundFile {
            path: self.path.clone(),
            source,
        })?;
        let source = Decoder::new(BufReader::new(file))?;
        let sink = self.output.sink()?;
        sink.set_volume(volume_scale(volume));
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// a short synthesized sine beep
pub struct Tone {
    sample_rate: u32,
    duration_ms: u32,
    frequency: f32,
    output: Output,
}

impl Tone {
    #[must_use]
    pub fn new(sample_rate: u32, duration_ms: u32, frequency: f32) -> Self {
        Self {
            sample_rate,
            duration_ms,
            frequency,
            output: Output::default(),
        }
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY)
    }
}

impl AlarmEmitter for Tone {
    fn emit(&mut self, volume: u8) -> Result<(), AlarmError> {
        let samples = synthesize(self.sample_rate, self.duration_ms, self.frequency, volume);
        if samples.is_empty() {
            return Ok(());
        }
        let sink = self.output.sink()?;
        // the amplitude is already scaled in the samples
        sink.append(SamplesBuffer::new(1, self.sample_rate, samples));
        sink.sleep_until_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn sample_count() {
        assert_eq!(synthesize(SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY, 100).len(), 4410);
        assert_eq!(synthesize(8000, 250, 440.0, 100).len(), 2000);
        assert!(synthesize(SAMPLE_RATE, 0, TONE_FREQUENCY, 100).is_empty());
    }

    #[quickcheck]
    fn muted_tone_is_silent(frequency: u16) -> bool {
        synthesize(SAMPLE_RATE, TONE_DURATION_MS, f32::from(frequency), 0)
            .iter()
            .all(|sample| *sample == 0.0)
    }

    #[test]
    fn full_volume_is_full_scale() {
        // a second of 1 kHz lands a sample within a hair of every peak
        let samples = synthesize(SAMPLE_RATE, 1000, TONE_FREQUENCY, 100);
        let peak = samples.iter().copied().fold(0.0f32, |peak, s| peak.max(s.abs()));
        assert!((peak - 1.0).abs() < 1e-3, "peak was {peak}");
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn volume_scales_linearly() {
        let full = synthesize(SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY, 100);
        let half = synthesize(SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY, 50);
        for (full, half) in full.iter().zip(&half) {
            assert!((full * 0.5 - half).abs() < 1e-6);
        }
    }

    #[test]
    fn volume_above_100_is_clamped() {
        assert_eq!(
            synthesize(SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY, 255),
            synthesize(SAMPLE_RATE, TONE_DURATION_MS, TONE_FREQUENCY, 100)
        );
        assert!((volume_scale(255) - 1.0).abs() < f32::EPSILON);
        assert!(volume_scale(0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_player_command() {
        let mut player = ExternalPlayer::new("  ".to_string(), PathBuf::from("beep.mp3"));
        assert!(matches!(player.emit(100), Err(AlarmError::BadCommand(_))));
        let mut player = ExternalPlayer::new("aplay \"unclosed".to_string(), PathBuf::from("beep.mp3"));
        assert!(matches!(player.emit(100), Err(AlarmError::BadCommand(_))));
    }

    #[test]
    fn missing_player_is_an_error() {
        let mut player = ExternalPlayer::new(
            "focus-timer-no-such-player --quiet".to_string(),
            PathBuf::from("beep.mp3"),
        );
        match player.emit(100) {
            Err(AlarmError::PlayerFailed { program, .. }) => {
                assert_eq!(program, "focus-timer-no-such-player");
            }
            other => panic!("expected PlayerFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn player_exit_status_is_checked() {
        let mut player = ExternalPlayer::new("true".to_string(), PathBuf::from("beep.mp3"));
        assert!(player.emit(100).is_ok());
        let mut player = ExternalPlayer::new("false".to_string(), PathBuf::from("beep.mp3"));
        assert!(matches!(
            player.emit(100),
            Err(AlarmError::PlayerExited { .. })
        ));
    }

    #[test]
    fn failed_resource_is_reopened() {
        let mut opened = 0;
        let mut slot = None;
        let mut open = || -> Result<u32, &str> {
            opened += 1;
            Ok(opened)
        };

        assert_eq!(with_reopen(&mut slot, &mut open, |n| Ok(*n)), Ok(1));
        assert_eq!(with_reopen(&mut slot, &mut open, |n| Ok(*n)), Ok(1));
        assert_eq!(slot, Some(1));

        assert_eq!(with_reopen(&mut slot, &mut open, |_| Err::<u32, _>("gone")), Err("gone"));
        assert_eq!(slot, None);

        assert_eq!(with_reopen(&mut slot, &mut open, |n| Ok(*n)), Ok(2));
        assert_eq!(opened, 2);
    }

    #[test]
    fn failed_open_leaves_slot_empty() {
        let mut slot: Option<u32> = None;
        assert_eq!(with_reopen(&mut slot, || Err("no device"), |n| Ok(*n)), Err("no device"));
        assert_eq!(slot, None);
    }

    #[test]
    fn missing_sound_file_is_an_error() {
        let mut sound = SoundFile::new(PathBuf::from("/no/such/dir/beep.mp3"));
        assert!(matches!(sound.emit(100), Err(AlarmError::SoundFile { .. })));
    }
}
