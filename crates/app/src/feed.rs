//! Newline-delimited JSON input.

use std::io::{self, BufRead};

use tracing::warn;

use hooksink_events::{EventBus, InboundMessage};

#[derive(Debug, Default)]
pub struct FeedSummary {
    pub published: u64,
    pub skipped: u64,
    /// Set when reading stopped early on an IO error.
    pub read_error: Option<io::Error>,
}

/// Publish every parsable line of `input` to `bus`. Blank lines are ignored;
/// unparsable lines are logged and skipped.
pub fn publish_lines<R, B>(input: R, bus: &B) -> FeedSummary
where
    R: BufRead,
    B: EventBus<InboundMessage> + ?Sized,
{
    let mut summary = FeedSummary::default();

    for (line_no, line) in input.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                summary.read_error = Some(err);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<InboundMessage>(&line) {
            Ok(message) => message,
            Err(err) => {
                warn!(line = line_no + 1, error = %err, "skipping unparsable message");
                summary.skipped += 1;
                continue;
            }
        };

        match bus.publish(message) {
            Ok(()) => summary.published += 1,
            Err(err) => {
                warn!(line = line_no + 1, error = ?err, "bus refused message");
                summary.skipped += 1;
            }
        }
    }

    summary
}
