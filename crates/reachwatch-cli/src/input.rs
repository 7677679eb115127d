// Line-based signal source: one host event per line
use reachwatch_core::{HostEvent, SignalSender};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

/// Forward every parseable line to the tracker until EOF.
/// Blank lines and `#` comments are skipped; junk, including lines that
/// are not UTF-8, is logged and skipped. Returns how many events were forwarded.
pub async fn forward_lines<R>(mut reader: R, sender: SignalSender) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut forwarded = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("skipping line that is not UTF-8: {}", e);
                continue;
            }
        };
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.parse::<HostEvent>() {
            Ok(event) => {
                sender.send(event).await?;
                forwarded += 1;
            }
            Err(e) => warn!("skipping line: {}", e),
        }
    }

    Ok(forwarded)
}
