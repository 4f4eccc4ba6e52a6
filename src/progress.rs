//! A terminal spinner showing how many rows have been scanned.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::consts::format_number;
use crate::iterate::DocumentIterator;

/// Braille spinner frames.
const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Frame interval.
const INTERVAL: Duration = Duration::from_millis(80);

/// Render one spinner line.
fn render(frame: usize, label: &str, seen: u64) -> String {
    format!(
        "{} {} {} rows",
        FRAMES[frame % FRAMES.len()],
        label,
        format_number(seen)
    )
}

/// A spinner that polls an iterator's row counter from a background task.
///
/// Writes to stderr so it doesn't interfere with records on stdout.
pub struct Progress {
    handle: JoinHandle<()>,
    cancel: tokio::sync::watch::Sender<bool>,
}

impl Progress {
    pub fn start(label: &str, iterator: Arc<dyn DocumentIterator>) -> Self {
        let (cancel_tx, mut cancel_rx) = tokio::sync::watch::channel(false);
        let label = label.to_string();

        let handle = tokio::spawn(async move {
            let mut i = 0;
            loop {
                // \r moves to start of line, \x1b[2K clears the line
                eprint!("\x1b[2K\r{}", render(i, &label, iterator.seen()));
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(INTERVAL) => {}
                    _ = cancel_rx.changed() => break,
                }
                i += 1;
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self {
            handle,
            cancel: cancel_tx,
        }
    }

    /// Stop the spinner and clear its line.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DriverRegistry;
    use crate::iterate::SqlIterator;

    #[test]
    fn frames_are_single_braille_chars() {
        for frame in FRAMES {
            assert_eq!(frame.chars().count(), 1);
        }
    }

    #[test]
    fn render_formats_count() {
        assert_eq!(render(0, "counting", 1_234), "⠋ counting 1,234 rows");
        assert!(render(FRAMES.len(), "counting", 0).starts_with(FRAMES[0]));
    }

    #[tokio::test]
    async fn progress_starts_and_stops() {
        let iterator: Arc<dyn DocumentIterator> =
            Arc::new(SqlIterator::new("sql://sqlite3", &DriverRegistry::default()).unwrap());
        let progress = Progress::start("counting", iterator);
        tokio::time::sleep(Duration::from_millis(100)).await;
        progress.stop().await;
    }
}
