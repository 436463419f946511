use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, Stream};
use tokio::time::sleep;

/// Cadence of the typewriter reveal: one character per tick.
pub const CHAR_INTERVAL: Duration = Duration::from_millis(20);

/// Streams `text` one character at a time, pausing `interval` between
/// chunks. The producer lives inside the stream itself, so dropping the
/// stream (a disconnected client, a torn-down view) cancels the reveal
/// outright, and calling this again restarts it from the beginning.
pub fn typewriter(
    text: String,
    interval: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let chars: Vec<char> = text.chars().collect();
    stream::unfold((0usize, chars), move |(index, chars)| async move {
        if index >= chars.len() {
            return None;
        }
        if index > 0 {
            sleep(interval).await;
        }

        let mut buf = [0u8; 4];
        let chunk = Bytes::copy_from_slice(chars[index].encode_utf8(&mut buf).as_bytes());
        Some((Ok(chunk), (index + 1, chars)))
    })
}
