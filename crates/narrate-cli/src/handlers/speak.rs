//! Speak command handler.
//!
//! Wires an engine, starts the utterance and then runs a small event loop
//! on the main thread: engine events are printed as they arrive and, with
//! `--interactive`, playback commands typed on stdin are applied to the
//! engine. A reader thread forwards stdin lines over a channel so the loop
//! never blocks on the terminal.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use narrate_engine::{EngineConfig, SpeechEngine, SpeechEvent, split_sentences};

use crate::bootstrap::{self, Playback};
use crate::commands::SpeakArgs;
use crate::error::CliError;
use crate::input::{CONTROL_HELP, Control, read_text};

const LOOP_TICK: Duration = Duration::from_millis(10);

/// Execute the speak command.
pub fn execute(config: EngineConfig, args: &SpeakArgs) -> Result<()> {
    let text = read_text(args.file.as_deref())?;
    let total = split_sentences(&text).len();
    if total == 0 {
        println!("Nothing to speak.");
        return Ok(());
    }
    if let Some(from) = args.from {
        if from >= total {
            return Err(CliError::Arguments(format!(
                "--from {from} is out of range (text has {total} sentences)"
            ))
            .into());
        }
    }

    let Playback {
        mut engine,
        mut events,
        wav,
    } = bootstrap::build_engine(config, args)?;

    engine.initialize().map_err(CliError::from)?;
    engine
        .speak(&text, args.voice, args.speed)
        .map_err(CliError::from)?;
    if let Some(from) = args.from.filter(|&from| from > 0) {
        engine.jump_to_sentence(from).map_err(CliError::from)?;
    }

    let controls = args.interactive.then(spawn_stdin_reader);
    if controls.is_some() {
        eprintln!("{CONTROL_HELP}");
    }

    let mut session = Session {
        engine: &mut engine,
        interactive: controls.is_some(),
    };
    let outcome = session.run(&mut events, controls.as_ref());

    engine.stop();
    if let Some((device, path)) = wav {
        device.finalize().map_err(CliError::from)?;
        eprintln!("Wrote {}", path.display());
    }
    outcome
}

/// Forward stdin lines to the event loop.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("narrate-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Could not read commands from stdin");
    }
    rx
}

/// What the loop should do after handling input.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Session<'a> {
    engine: &'a mut SpeechEngine,
    interactive: bool,
}

impl Session<'_> {
    fn run(
        &mut self,
        events: &mut narrate_engine::EventReceiver,
        controls: Option<&Receiver<String>>,
    ) -> Result<()> {
        let mut stdin_open = controls.is_some();

        loop {
            while let Ok(event) = events.try_recv() {
                if self.report(&event) == Flow::Quit {
                    return Ok(());
                }
            }

            if stdin_open {
                if let Some(controls) = controls {
                    match controls.try_recv() {
                        Ok(line) => {
                            if self.apply(&line)? == Flow::Quit {
                                return Ok(());
                            }
                        }
                        Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Disconnected) => stdin_open = false,
                    }
                }
            }

            thread::sleep(LOOP_TICK);
        }
    }

    /// Print an engine event.
    fn report(&self, event: &SpeechEvent) -> Flow {
        match event {
            SpeechEvent::SentenceStarted(index) => {
                let sentence = self
                    .engine
                    .sentences()
                    .get(*index)
                    .map_or("", String::as_str);
                println!("[{index}] {sentence}");
            }
            SpeechEvent::SentenceCompleted(index) => {
                tracing::debug!(sentence = index, "Sentence completed");
            }
            SpeechEvent::StateChanged(state) => {
                tracing::debug!(?state, "Engine state changed");
            }
            SpeechEvent::Error(message) => {
                eprintln!("error: {message}");
            }
            SpeechEvent::PlaybackComplete => {
                if !self.interactive {
                    return Flow::Quit;
                }
                eprintln!("Finished. `j N` or `r` to replay, `q` to quit.");
            }
        }
        Flow::Continue
    }

    /// Apply one line of interactive input.
    fn apply(&mut self, line: &str) -> Result<Flow> {
        let control = match Control::parse(line) {
            None => return Ok(Flow::Continue),
            Some(Err(message)) => {
                eprintln!("{message}");
                return Ok(Flow::Continue);
            }
            Some(Ok(control)) => control,
        };

        match control {
            Control::Pause => self.engine.pause(),
            Control::Resume => self.engine.resume().map_err(CliError::from)?,
            Control::Jump(index) => {
                let total = self.engine.sentence_count();
                if index < total {
                    self.engine.jump_to_sentence(index).map_err(CliError::from)?;
                } else {
                    eprintln!("no sentence {index} (text has {total} sentences)");
                }
            }
            Control::Stop => self.engine.stop(),
            Control::Quit => return Ok(Flow::Quit),
            Control::Help => eprintln!("{CONTROL_HELP}"),
        }

        tracing::debug!(?control, state = ?self.engine.state(), "Command applied");
        Ok(Flow::Continue)
    }
}
