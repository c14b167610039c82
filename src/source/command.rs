//! External Measurement Engine Source
//!
//! Runs the configured measurement program as a child process and forwards
//! each stdout line as one raw sample record. The engine is expected to
//! emit UTF-8 records containing at least a `device_name` field; everything
//! else is passed through verbatim.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use crate::bridge::SampleSender;
use crate::source::{SampleSource, SourceError};

/// Sample source backed by an external measurement command.
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SampleSource for CommandSource {
    fn run(&mut self, out: SampleSender) -> Result<(), SourceError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|error| SourceError::Spawn {
                program: self.program.clone(),
                error,
            })?;

        tracing::info!(program = %self.program, pid = child.id(), "measurement engine started");

        // Stdio::piped guarantees the handle exists
        let stdout = child.stdout.take().expect("child stdout was piped");
        let reader = BufReader::new(stdout);

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            if out.push(line).is_err() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::QueueClosed);
            }
        }

        let status = child.wait()?;
        tracing::info!(%status, "measurement engine exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SampleQueue;

    #[tokio::test]
    async fn test_forwards_stdout_lines() {
        let (tx, mut rx) = SampleQueue::channel(16);

        let mut source = CommandSource::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"printf '{"device_name": "eth0"}\n{"device_name": "wlan0"}\n'"#.to_string(),
            ],
        );

        let handle = std::thread::spawn(move || source.run(tx));

        assert_eq!(rx.pop().await.as_deref(), Some(r#"{"device_name": "eth0"}"#));
        assert_eq!(rx.pop().await.as_deref(), Some(r#"{"device_name": "wlan0"}"#));

        // Engine exit closes the queue
        assert_eq!(rx.pop().await, None);
        handle.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let (tx, mut rx) = SampleQueue::channel(16);

        let mut source = CommandSource::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"printf '\n{"device_name": "lo"}\n\n'"#.to_string(),
            ],
        );

        let handle = std::thread::spawn(move || source.run(tx));

        assert_eq!(rx.pop().await.as_deref(), Some(r#"{"device_name": "lo"}"#));
        assert_eq!(rx.pop().await, None);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_spawn_failure() {
        let (tx, _rx) = SampleQueue::channel(16);

        let mut source = CommandSource::new("definitely-not-a-real-binary", vec![]);
        let result = source.run(tx);
        assert!(matches!(result, Err(SourceError::Spawn { .. })));
    }

    #[test]
    fn test_queue_closed_stops_engine() {
        let (tx, rx) = SampleQueue::channel(16);
        drop(rx);

        let mut source = CommandSource::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"while true; do echo '{"device_name": "eth0"}'; done"#.to_string(),
            ],
        );

        let result = source.run(tx);
        assert!(matches!(result, Err(SourceError::QueueClosed)));
    }
}
