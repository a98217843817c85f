//! Banner grabbing for open TCP connections.
//!
//! After a successful connect the probe writes a small protocol-agnostic
//! request and reads whatever comes back. Services that greet first (SSH,
//! FTP, SMTP) answer with their greeting; text protocols that wait for a
//! request (HTTP) answer the request.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tracing::trace;

/// Maximum bytes to read for a banner.
pub const MAX_BANNER_SIZE: usize = 1024;

/// Default timeout for the banner exchange.
pub const BANNER_TIMEOUT: Duration = Duration::from_secs(2);

/// Request sent to elicit a response from text-based services.
pub const HTTP_PROBE: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";

/// Grab a banner from an open stream.
///
/// The whole exchange (write plus reads) is bounded by `limit`; bytes that
/// arrived before the deadline are kept. Returns `None` when the service
/// sent nothing usable in time, which is never an error for the caller.
pub async fn grab_banner<S>(stream: &mut S, limit: Duration) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let deadline = Instant::now() + limit;

    // Some services close or reset as soon as they see a request they
    // don't speak; whatever they already sent is still worth reading.
    match timeout_at(deadline, stream.write_all(HTTP_PROBE)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => trace!(error = %e, "banner probe write failed"),
        Err(_) => return None,
    }

    let mut buffer = vec![0u8; MAX_BANNER_SIZE];
    let mut filled = 0;
    while filled < buffer.len() {
        match timeout_at(deadline, stream.read(&mut buffer[filled..])).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => {
                filled += n;
                // A complete line is enough for identification.
                if buffer[..filled].contains(&b'\n') {
                    break;
                }
            }
            Ok(Err(e)) => {
                trace!(error = %e, "banner read failed");
                break;
            }
        }
    }

    decode_banner(&buffer[..filled])
}

/// Decode raw service bytes into banner text.
///
/// Invalid UTF-8 is replaced and then dropped along with control bytes;
/// line breaks are normalised to `\n`. Returns `None` if nothing printable
/// remains.
pub fn decode_banner(data: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    let cleaned: String = text
        .replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\r' { '\n' } else { c })
        .filter(|&c| c == '\n' || c == '\t' || !(c.is_control() || c == char::REPLACEMENT_CHARACTER))
        .collect();

    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// First line of a banner, for one-line displays.
pub fn first_line(banner: &str) -> &str {
    banner.lines().next().unwrap_or_default().trim()
}
