//! Where `ask_user` answers come from.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::debug;

/// A blocking source of answers to an agent's questions.
pub trait UserInput: Send {
    /// Show `question` and block for one line of input.
    ///
    /// `None` means the read was interrupted or the input is exhausted.
    fn ask(&mut self, question: &str) -> Option<String>;
}

enum Event {
    Line(String),
    Closed,
    Interrupted,
}

/// Reads answers line by line from standard input, or any other reader.
///
/// Lines are read on a background thread so that a pending question can be
/// cancelled through an [`Interrupter`].
pub struct StdinInput {
    source: Option<Box<dyn BufRead + Send>>,
    events: Receiver<Event>,
    sender: Sender<Event>,
    asking: Arc<AtomicBool>,
    closed: bool,
}

impl StdinInput {
    pub fn new() -> Self {
        Self::with_reader(io::BufReader::new(io::stdin()))
    }

    pub fn with_reader(reader: impl BufRead + Send + 'static) -> Self {
        let (sender, events) = mpsc::channel();
        Self {
            source: Some(Box::new(reader)),
            events,
            sender,
            asking: Arc::new(AtomicBool::new(false)),
            closed: false,
        }
    }

    /// A handle that cancels the question currently waiting for input.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            sender: self.sender.clone(),
            asking: Arc::clone(&self.asking),
        }
    }

    fn start_reader(&mut self) {
        let Some(mut source) = self.source.take() else {
            return;
        };
        let sender = self.sender.clone();
        thread::spawn(move || {
            loop {
                let mut line = String::new();
                let event = match source.read_line(&mut line) {
                    Ok(0) => Event::Closed,
                    Ok(_) => Event::Line(line.trim_end_matches(['\r', '\n']).to_string()),
                    Err(e) => {
                        debug!(error = %e, "User input closed");
                        Event::Closed
                    }
                };
                let last = matches!(event, Event::Closed);
                if sender.send(event).is_err() || last {
                    break;
                }
            }
        });
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInput for StdinInput {
    fn ask(&mut self, question: &str) -> Option<String> {
        if self.closed {
            return None;
        }

        let mut stdout = io::stdout().lock();
        // A closed stdout is not worth failing the read over.
        let _ = write!(stdout, "\n{question}\nYour response: ");
        let _ = stdout.flush();
        drop(stdout);

        self.start_reader();
        self.asking.store(true, Ordering::SeqCst);
        let event = self.events.recv();
        self.asking.store(false, Ordering::SeqCst);

        match event {
            Ok(Event::Line(line)) => Some(line),
            Ok(Event::Interrupted) => {
                debug!("User input cancelled");
                None
            }
            Ok(Event::Closed) | Err(_) => {
                self.closed = true;
                None
            }
        }
    }
}

/// Cancels a pending [`StdinInput::ask`]; see [`StdinInput::interrupter`].
#[derive(Clone)]
pub struct Interrupter {
    sender: Sender<Event>,
    asking: Arc<AtomicBool>,
}

impl Interrupter {
    /// Cancel the waiting question, which then returns `None`.
    ///
    /// Returns `false` when nothing is waiting, including a second
    /// interrupt for the same question; the caller decides what an
    /// interrupt means then.
    pub fn interrupt(&self) -> bool {
        self.asking.swap(false, Ordering::SeqCst) && self.sender.send(Event::Interrupted).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Duration;

    /// Blocks every read until the paired sender is dropped.
    struct Blocked(Receiver<()>);

    impl Read for Blocked {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn answers_line_by_line_then_closes() {
        let mut input = StdinInput::with_reader(Cursor::new("yes\r\nno\n"));
        assert_eq!(input.ask("first?").as_deref(), Some("yes"));
        assert_eq!(input.ask("second?").as_deref(), Some("no"));
        assert_eq!(input.ask("third?"), None);
        assert_eq!(input.ask("fourth?"), None);
    }

    #[test]
    fn interrupt_cancels_pending_question() {
        let (_hold, rx) = mpsc::channel::<()>();
        let mut input = StdinInput::with_reader(BufReader::new(Blocked(rx)));
        let interrupter = input.interrupter();

        let signal = thread::spawn(move || {
            while !interrupter.interrupt() {
                thread::sleep(Duration::from_millis(1));
            }
        });
        assert_eq!(input.ask("continue?"), None);
        signal.join().unwrap();

        assert!(!input.interrupter().interrupt(), "nothing is waiting now");
    }
}
