//! User acknowledgement after a successful update.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};

/// How a wait for acknowledgement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckResult {
    /// The user confirmed; the application may restart.
    Acknowledged,
    /// The signal source went away without confirming.
    Dismissed,
}

/// Something the orchestrator can block on until the user confirms.
pub trait AckSource: Send + Sync {
    /// Block until acknowledged or dismissed.
    fn wait(&self) -> AckResult;
}

/// Sending half of an acknowledgement channel, held by the UI.
#[derive(Debug, Clone)]
pub struct AckSender {
    tx: Sender<()>,
}

impl AckSender {
    /// Signal that the user dismissed the success notification.
    pub fn acknowledge(&self) {
        // A closed channel means the orchestrator already moved on.
        let _ = self.tx.send(());
    }
}

/// Receiving half of an acknowledgement channel.
#[derive(Debug)]
pub struct AckReceiver {
    rx: std::sync::Mutex<Receiver<()>>,
}

impl AckSource for AckReceiver {
    fn wait(&self) -> AckResult {
        let Ok(rx) = self.rx.lock() else {
            return AckResult::Dismissed;
        };
        match rx.recv() {
            Ok(()) => AckResult::Acknowledged,
            Err(_) => AckResult::Dismissed,
        }
    }
}

/// Create a connected acknowledgement pair.
///
/// Dropping every [`AckSender`] without calling `acknowledge` dismisses the wait.
#[must_use]
pub fn ack_channel() -> (AckSender, AckReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        AckSender { tx },
        AckReceiver {
            rx: std::sync::Mutex::new(rx),
        },
    )
}

/// Terminal prompt: prints a message and waits for Enter on stdin.
///
/// End of input counts as dismissal.
#[derive(Debug, Clone)]
pub struct ConsolePrompt {
    message: String,
}

impl ConsolePrompt {
    /// Prompt with a custom message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn wait_on<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> AckResult {
        let _ = writeln!(output, "{}", self.message);
        let _ = output.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => AckResult::Dismissed,
            Ok(_) => AckResult::Acknowledged,
            Err(e) => {
                tracing::warn!("Failed to read acknowledgement: {e}");
                AckResult::Dismissed
            }
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new("Press Enter to restart the application.")
    }
}

impl AckSource for ConsolePrompt {
    fn wait(&self) -> AckResult {
        self.wait_on(io::stdin().lock(), io::stderr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_acknowledge_from_another_thread() {
        let (tx, rx) = ack_channel();
        let handle = thread::spawn(move || tx.acknowledge());
        assert_eq!(rx.wait(), AckResult::Acknowledged);
        handle.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_dismisses() {
        let (tx, rx) = ack_channel();
        drop(tx);
        assert_eq!(rx.wait(), AckResult::Dismissed);
    }

    #[test]
    fn test_console_prompt() {
        let prompt = ConsolePrompt::default();
        let mut shown = Vec::new();
        assert_eq!(prompt.wait_on(&b"\n"[..], &mut shown), AckResult::Acknowledged);
        assert!(String::from_utf8(shown).unwrap().contains("Press Enter"));

        assert_eq!(prompt.wait_on(&b""[..], Vec::new()), AckResult::Dismissed);
    }
}
