//! Line-based operator commands read from stdin.

use std::io::BufRead;
use std::thread;

use anyhow::Result;
use crossbeam_channel::Sender;
use log::{debug, warn};
use riff_core::ModeEvent;

/// Maps one input line to an event. `None` for unknown commands.
pub fn parse_command(line: &str) -> Option<ModeEvent> {
    let cmd = line.trim().to_ascii_lowercase();
    let event = match cmd.as_str() {
        "" | "enter" => ModeEvent::Confirm,
        "w" | "up" => ModeEvent::Up,
        "s" | "down" => ModeEvent::Down,
        "b" | "esc" | "back" => ModeEvent::Back,
        "p" | "space" => ModeEvent::TogglePause,
        "+" | "=" => ModeEvent::OffsetUp,
        "-" => ModeEvent::OffsetDown,
        "q" | "quit" => ModeEvent::Quit,
        other => match other.parse::<usize>() {
            // Rows are numbered from 1 on screen.
            Ok(row) if row >= 1 => ModeEvent::Click(row - 1),
            _ => return None,
        },
    };
    Some(event)
}

/// Spawns a thread forwarding parsed stdin commands.
///
/// The thread ends at EOF or once the receiver is gone. EOF is forwarded
/// as `Quit`.
pub fn spawn_stdin_reader(events: Sender<ModeEvent>) -> Result<()> {
    thread::Builder::new()
        .name("riff-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(event) => {
                        debug!("input {:?} -> {:?}", line, event);
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    None => warn!("Unknown command: {:?}", line.trim()),
                }
            }
            let _ = events.send(ModeEvent::Quit);
        })?;
    Ok(())
}
