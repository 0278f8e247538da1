//! User controls.
//!
//! The page's buttons become line commands on stdin:
//!
//! ```text
//! local | network | upload <path> | start | stop | save | quit
//! ```
//!
//! A reader thread parses lines and forwards them over a channel; the loop
//! drains the channel between ticks.

use anyhow::{anyhow, Result};
use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Control {
    /// Pick a file; it wins over camera intents at the next source selection.
    ChooseFile(String),
    UseLocalCamera,
    UseNetworkCamera,
    /// Pick a file and select it right away.
    Upload(String),
    StartRecording,
    StopRecording,
    Save,
    Quit,
}

impl Control {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let control = match command.to_ascii_lowercase().as_str() {
            "local" => Control::UseLocalCamera,
            "network" => Control::UseNetworkCamera,
            "file" | "choose" => Control::ChooseFile(require_path(command, rest)?),
            "upload" => Control::Upload(require_path(command, rest)?),
            "start" => Control::StartRecording,
            "stop" => Control::StopRecording,
            "save" => Control::Save,
            "quit" | "exit" => Control::Quit,
            "" => return Err(anyhow!("empty command")),
            other => return Err(anyhow!("unknown command: {}", other)),
        };
        Ok(control)
    }
}

fn require_path(command: &str, rest: &str) -> Result<String> {
    if rest.is_empty() {
        return Err(anyhow!("{} needs a file path", command));
    }
    Ok(rest.to_string())
}

/// Parse commands from `reader` until EOF or until the receiver goes away.
pub fn forward_commands<R: BufRead>(reader: R, tx: &Sender<Control>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("control input closed: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match Control::parse(&line) {
            Ok(control) => {
                if tx.send(control).is_err() {
                    return;
                }
            }
            Err(e) => log::warn!("ignored control: {}", e),
        }
    }
}

/// Spawn the stdin reader thread.
pub fn spawn_stdin_reader(tx: Sender<Control>) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("control-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            forward_commands(stdin.lock(), &tx);
            log::debug!("control reader finished");
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn parses_commands() {
        assert_eq!(Control::parse("local").unwrap(), Control::UseLocalCamera);
        assert_eq!(Control::parse(" NETWORK ").unwrap(), Control::UseNetworkCamera);
        assert_eq!(
            Control::parse("upload clips/my video.mjpeg").unwrap(),
            Control::Upload("clips/my video.mjpeg".to_string())
        );
        assert_eq!(
            Control::parse("file a.mjpeg").unwrap(),
            Control::ChooseFile("a.mjpeg".to_string())
        );
        assert_eq!(Control::parse("start").unwrap(), Control::StartRecording);
        assert_eq!(Control::parse("stop").unwrap(), Control::StopRecording);
        assert_eq!(Control::parse("save").unwrap(), Control::Save);
        assert_eq!(Control::parse("exit").unwrap(), Control::Quit);
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(Control::parse("upload").is_err());
        assert!(Control::parse("rewind").is_err());
        assert!(Control::parse("   ").is_err());
    }

    #[test]
    fn forwards_valid_lines_only() {
        let (tx, rx) = mpsc::channel();
        forward_commands(Cursor::new("start\n\nbogus\nstop\nsave\n"), &tx);
        drop(tx);
        let got: Vec<Control> = rx.iter().collect();
        assert_eq!(
            got,
            vec![Control::StartRecording, Control::StopRecording, Control::Save]
        );
    }
}
