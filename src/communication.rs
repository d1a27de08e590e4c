//! Messages for the alarm thread and the thread itself.
//!
//! Playing the alarm blocks until the sound is done, so it happens on its
//! own thread and the gui only ever sends it messages. The audio output
//! isn't `Send` so the emitter is built on that thread too.

use std::{
    io,
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use crate::{
    alarm::{self, AlarmEmitter},
    config::AlarmConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// play the alarm once at `volume` percent
    Ring { volume: u8 },
    /// forget any ring that hasn't started playing yet
    Silence,
    /// swap the emitter for one built from the new config
    Configure(AlarmConfig),
    Shutdown,
}

pub struct AlarmWorker {
    sender: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

/// starts the alarm thread with the emitter for `config`
///
/// # Errors
/// if the thread couldn't be spawned
pub fn spawn_alarm_worker(config: AlarmConfig) -> io::Result<AlarmWorker> {
    spawn_with(config, alarm::emitter)
}

/// starts the alarm thread, using `build` to make an emitter whenever the config changes
///
/// # Errors
/// if the thread couldn't be spawned
pub fn spawn_with<F>(config: AlarmConfig, build: F) -> io::Result<AlarmWorker>
where
    F: Fn(&AlarmConfig) -> Box<dyn AlarmEmitter> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("alarm".to_string())
        .spawn(move || run(&config, &build, &receiver))?;
    Ok(AlarmWorker {
        sender,
        handle: Some(handle),
    })
}

fn run<F>(config: &AlarmConfig, build: &F, receiver: &Receiver<Message>)
where
    F: Fn(&AlarmConfig) -> Box<dyn AlarmEmitter>,
{
    let mut emitter = build(config);
    log::info!("alarm thread started using the {} strategy", config.strategy);
    // a closed channel means the app is gone
    while let Ok(first) = receiver.recv() {
        // everything that queued up while the last alarm was playing is
        // handled in one go so rings can't pile up behind a long sound
        let mut ring = None;
        for message in std::iter::once(first).chain(receiver.try_iter()) {
            match message {
                Message::Ring { volume } => ring = Some(volume),
                Message::Silence => {
                    if ring.take().is_some() {
                        log::info!("dropping pending alarm");
                    }
                }
                Message::Configure(config) => {
                    // a ring sent before the change plays the way it was asked for
                    if let Some(volume) = ring.take() {
                        emit(&mut *emitter, volume);
                    }
                    log::info!("alarm strategy set to {}", config.strategy);
                    emitter = build(&config);
                }
                Message::Shutdown => {
                    log::info!("alarm thread stopped");
                    return;
                }
            }
        }
        if let Some(volume) = ring {
            emit(&mut *emitter, volume);
        }
    }
    log::info!("alarm thread stopped");
}

fn emit(emitter: &mut dyn AlarmEmitter, volume: u8) {
    log::info!("ringing alarm at {volume}% volume");
    if let Err(e) = emitter.emit(volume) {
        log::warn!("couldn't play alarm: {e}");
    }
}

impl AlarmWorker {
    pub fn ring(&self, volume: u8) {
        self.send(Message::Ring { volume });
    }

    /// drops rings that are still waiting, one that is already playing finishes
    pub fn silence(&self) {
        self.send(Message::Silence);
    }

    pub fn configure(&self, config: AlarmConfig) {
        self.send(Message::Configure(config));
    }

    fn send(&self, message: Message) {
        if let Err(e) = self.sender.send(message) {
            log::warn!("alarm thread is gone, dropping {:?}", e.0);
        }
    }

    /// asks the thread to stop and waits for whatever it is playing to finish
    pub fn shutdown(mut self) {
        self.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("alarm thread panicked");
            }
        }
    }
}

impl Drop for AlarmWorker {
    fn drop(&mut self) {
        // don't wait on a playing alarm here, the thread finishes on its own
        if self.handle.is_some() {
            let _ = self.sender.send(Message::Shutdown);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{alarm::AlarmError, config::AlarmStrategy};

    pub(crate) const WAIT: Duration = Duration::from_secs(2);

    /// reports each alarm as it starts, then takes `delay` to "play" it
    struct Recorder {
        strategy: AlarmStrategy,
        played: Sender<(AlarmStrategy, u8)>,
        delay: Duration,
        fail: bool,
    }

    impl AlarmEmitter for Recorder {
        fn emit(&mut self, volume: u8) -> Result<(), AlarmError> {
            let _ = self.played.send((self.strategy, volume));
            thread::sleep(self.delay);
            if self.fail {
                Err(AlarmError::BadCommand(String::new()))
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn recording_worker(
        config: AlarmConfig,
        delay: Duration,
        fail: bool,
    ) -> (AlarmWorker, Receiver<(AlarmStrategy, u8)>) {
        let (played, recorded) = mpsc::channel();
        let worker = spawn_with(config, move |config| -> Box<dyn AlarmEmitter> {
            Box::new(Recorder {
                strategy: config.strategy,
                played: played.clone(),
                delay,
                fail,
            })
        })
        .unwrap();
        (worker, recorded)
    }

    fn quick_worker() -> (AlarmWorker, Receiver<(AlarmStrategy, u8)>) {
        recording_worker(AlarmConfig::default(), Duration::ZERO, false)
    }

    #[test]
    fn rings_when_asked() {
        let (worker, played) = quick_worker();
        worker.ring(40);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 40)));
        worker.ring(100);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 100)));
        worker.shutdown();
        assert!(played.try_recv().is_err());
    }

    #[test]
    fn configure_swaps_emitter() {
        let (worker, played) = quick_worker();
        worker.ring(10);
        worker.configure(AlarmConfig {
            strategy: AlarmStrategy::External,
            ..AlarmConfig::default()
        });
        worker.ring(20);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 10)));
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::External, 20)));
        worker.shutdown();
    }

    #[test]
    fn failures_are_not_fatal() {
        let (worker, played) = recording_worker(AlarmConfig::default(), Duration::ZERO, true);
        worker.ring(1);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 1)));
        worker.ring(2);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 2)));
        worker.shutdown();
    }

    #[test]
    fn rings_during_a_long_alarm_collapse() {
        let (worker, played) =
            recording_worker(AlarmConfig::default(), Duration::from_millis(100), false);
        for volume in 1..=10 {
            worker.ring(volume);
        }
        // give the worker time to get through whatever it kept
        thread::sleep(Duration::from_millis(500));
        worker.shutdown();
        let played: Vec<_> = played.try_iter().collect();
        assert!(!played.is_empty());
        assert!(played.len() < 10, "played {played:?}");
        assert_eq!(played.last(), Some(&(AlarmStrategy::Tone, 10)));
    }

    #[test]
    fn silence_drops_pending_rings() {
        let (worker, played) =
            recording_worker(AlarmConfig::default(), Duration::from_millis(300), false);
        worker.ring(1);
        // the first alarm is playing once it has been reported
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 1)));
        worker.ring(2);
        worker.ring(3);
        worker.silence();
        worker.shutdown();
        assert!(played.try_recv().is_err());
    }

    #[test]
    fn ring_after_silence_still_plays() {
        let (worker, played) =
            recording_worker(AlarmConfig::default(), Duration::from_millis(300), false);
        worker.ring(1);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 1)));
        worker.ring(2);
        worker.silence();
        worker.ring(3);
        assert_eq!(played.recv_timeout(WAIT), Ok((AlarmStrategy::Tone, 3)));
        worker.shutdown();
        assert!(played.try_recv().is_err());
    }

    #[test]
    fn nothing_rings_after_shutdown() {
        let (worker, played) = quick_worker();
        worker.send(Message::Shutdown);
        worker.ring(50);
        worker.shutdown();
        assert!(played.try_recv().is_err());
    }
}
