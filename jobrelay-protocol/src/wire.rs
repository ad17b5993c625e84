//! The line-delimited text protocol (§4.1, §6).
//!
//! Two message shapes share the same connection: framed control tokens
//! (`READY`/`START`/`KILL`/`DONE`) and `key<TAB>value<LF>` records during
//! configure, followed by `target<TAB>command<TAB>status<TAB>output<LF>`
//! result records once running.
//!
//! Reads are framed on the trailing `\n` rather than taken as a single
//! `recv()` of up to 4096 bytes: on a real socket a write this small nearly
//! always arrives in one read, but nothing guarantees it under an async
//! runtime, and splitting a configuration message across two reads would
//! silently corrupt the echo-discipline invariant (§8). Reading to the
//! delimiter is the same framing, made robust.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::status::Status;

/// Maximum size, in bytes, of a single result record (§4.1, §6).
pub const MAX_RECORD_BYTES: usize = 4096;

const TAB: u8 = b'\t';
const LF: u8 = b'\n';

/// One of the four framed control tokens exchanged over the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    Ready,
    Start,
    Kill,
    Done,
}

impl ControlToken {
    /// Exact on-wire byte sequence, including the trailing delimiter.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Ready => b"// READY //\n",
            Self::Start => b"// START //\n",
            Self::Kill => b"// KILL //\n",
            Self::Done => b"// DONE //\n",
        }
    }

    /// Parses a token from a raw received buffer, if it matches exactly.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        for token in [Self::Ready, Self::Start, Self::Kill, Self::Done] {
            if buf == token.as_bytes() {
                return Some(token);
            }
        }
        None
    }

    /// Writes this token to `stream`.
    ///
    /// # Errors
    /// Returns an error if the underlying write fails.
    pub async fn send<W: tokio::io::AsyncWrite + Unpin>(
        self,
        stream: &mut W,
    ) -> Result<(), ProtocolError> {
        stream.write_all(self.as_bytes()).await?;
        Ok(())
    }
}

/// A `key<TAB>value<LF>` configuration message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encodes this message to its exact on-wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.key.len() + 1 + self.value.len() + 1);
        buf.extend_from_slice(self.key.as_bytes());
        buf.push(TAB);
        buf.extend_from_slice(self.value.as_bytes());
        buf.push(LF);
        buf
    }

    /// Parses a `key<TAB>value<LF>` (or `key<TAB>value`, sans the trailing
    /// newline) message. Only the first TAB separates key from value, so a
    /// `command` value may itself contain TABs... though §9's escaping rule
    /// means senders never emit TAB/LF inside values in this protocol.
    ///
    /// Key validity is a caller concern (the two sides recognize different
    /// keys); this only returns `None` if the line doesn't contain a TAB.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let text = core::str::from_utf8(buf).ok()?;
        let text = text.strip_suffix('\n').unwrap_or(text);
        let (key, value) = text.split_once('\t')?;
        Some(Self::new(key, value))
    }
}

/// Strips TAB and LF from a field before it's placed into a TAB-delimited
/// record, so a naive 4-field split on the receiving end can't be confused
/// by command output that happens to contain either byte (§9).
#[must_use]
pub fn sanitize_field(value: &str) -> String {
    value.chars().filter(|&c| c != '\t' && c != '\n').collect()
}

/// One `target<TAB>command<TAB>status<TAB>output<LF>` result record (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub target: String,
    pub command: String,
    pub status: Status,
    pub output: String,
}

impl ResultRecord {
    #[must_use]
    pub fn new(target: impl Into<String>, command: impl Into<String>, status: Status, output: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            command: command.into(),
            status,
            output: output.into(),
        }
    }

    /// Encodes this record, sanitizing every field and truncating `output`
    /// so the total stays within [`MAX_RECORD_BYTES`] (§4.1).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let target = sanitize_field(&self.target);
        let command = sanitize_field(&self.command);
        let status = self.status.to_string();
        let mut output = sanitize_field(&self.output);

        let fixed_len = target.len() + command.len() + status.len() + 4; // 3 TABs + LF
        if fixed_len + output.len() > MAX_RECORD_BYTES {
            let budget = MAX_RECORD_BYTES.saturating_sub(fixed_len);
            truncate_to_byte_budget(&mut output, budget);
        }

        let mut buf = Vec::with_capacity(fixed_len + output.len());
        buf.extend_from_slice(target.as_bytes());
        buf.push(TAB);
        buf.extend_from_slice(command.as_bytes());
        buf.push(TAB);
        buf.extend_from_slice(status.as_bytes());
        buf.push(TAB);
        buf.extend_from_slice(output.as_bytes());
        buf.push(LF);
        buf
    }

    /// Parses a result record, padding missing trailing fields with empty
    /// strings (§4.3) and rejecting records over [`MAX_RECORD_BYTES`] (§4.1).
    ///
    /// # Errors
    /// Returns [`ProtocolError::RecordTooLong`] if `buf` exceeds the bound,
    /// or [`ProtocolError::InvalidUtf8`] if it isn't valid UTF-8.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() > MAX_RECORD_BYTES {
            return Err(ProtocolError::RecordTooLong {
                max: MAX_RECORD_BYTES,
            });
        }
        let text = core::str::from_utf8(buf)?;
        let text = text.strip_suffix('\n').unwrap_or(text);
        let mut fields = text.splitn(4, '\t').collect::<Vec<_>>();
        while fields.len() < 4 {
            fields.push("");
        }
        let status = Status::from_str_or_killed(fields[2]);
        Ok(Self::new(fields[0], fields[1], status, fields[3]))
    }
}

/// Truncates `s` in place to at most `budget` bytes, on a UTF-8 boundary.
fn truncate_to_byte_budget(s: &mut String, budget: usize) {
    if s.len() <= budget {
        return;
    }
    let mut cut = budget;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Reads one frame (a line ending in `\n`, or the token's exact byte
/// sequence) from `stream`, up to [`MAX_RECORD_BYTES`] bytes.
///
/// Returns `Ok(None)` on a clean EOF with no bytes read.
///
/// # Errors
/// Returns an error if the underlying read fails or the frame exceeds the
/// size bound without terminating.
pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Ok(Some(buf));
        }
        buf.push(byte[0]);
        if byte[0] == LF {
            return Ok(Some(buf));
        }
        if buf.len() > MAX_RECORD_BYTES {
            return Err(ProtocolError::RecordTooLong {
                max: MAX_RECORD_BYTES,
            });
        }
    }
}

/// Spawns a task that reads frames from `reader` in a loop and forwards each
/// one (or the terminal EOF/error) over the returned channel.
///
/// `mpsc::Receiver::recv` is cancellation-safe, which `read_frame` itself is
/// not: a `select!` that raced `read_frame` directly against a timer could
/// drop a future mid-frame and lose already-consumed bytes. Racing the
/// channel instead keeps the byte-level read loop running to completion on
/// its own task regardless of what the caller's `select!` picks.
#[must_use]
pub fn spawn_frame_reader<R>(mut reader: R) -> tokio::sync::mpsc::Receiver<Result<Option<Vec<u8>>, ProtocolError>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            let frame = read_frame(&mut reader).await;
            let is_terminal = !matches!(frame, Ok(Some(_)));
            if tx.send(frame).await.is_err() || is_terminal {
                return;
            }
        }
    });
    rx
}

impl Status {
    /// Like [`core::str::FromStr`], but defaults to [`Status::Killed`] for an
    /// unrecognized or missing status field rather than erroring, matching
    /// the signoff synthesis in §4.3: an incomplete record about a command
    /// that was never finished is treated the same as one that was killed.
    #[must_use]
    fn from_str_or_killed(s: &str) -> Self {
        s.parse().unwrap_or(Self::Killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_tokens_round_trip() {
        for token in [
            ControlToken::Ready,
            ControlToken::Start,
            ControlToken::Kill,
            ControlToken::Done,
        ] {
            assert_eq!(ControlToken::parse(token.as_bytes()), Some(token));
        }
    }

    #[test]
    fn rejects_near_miss_tokens() {
        assert_eq!(ControlToken::parse(b"// READY //"), None);
        assert_eq!(ControlToken::parse(b"// ready //\n"), None);
    }

    #[test]
    fn key_value_round_trips() {
        let kv = KeyValue::new("command", "echo hi");
        let encoded = kv.encode();
        assert_eq!(encoded, b"command\techo hi\n");
        assert_eq!(KeyValue::parse(&encoded), Some(kv));
    }

    #[test]
    fn result_record_round_trips() {
        let record = ResultRecord::new("t1", "echo hi", Status::Success, "hi\n");
        let encoded = record.encode();
        let parsed = ResultRecord::parse(&encoded).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn result_record_pads_missing_fields() {
        let parsed = ResultRecord::parse(b"t1\tcmd\n").unwrap();
        assert_eq!(parsed.target, "t1");
        assert_eq!(parsed.command, "cmd");
        assert_eq!(parsed.status, Status::Killed);
        assert_eq!(parsed.output, "");
    }

    #[test]
    fn result_record_strips_tab_and_newline_from_output() {
        let record = ResultRecord::new("t1", "cmd", Status::Success, "line1\tline2\nline3");
        let encoded = record.encode();
        let parsed = ResultRecord::parse(&encoded).unwrap();
        assert_eq!(parsed.output, "line1line2line3");
        assert_eq!(parsed.target, "t1");
        assert_eq!(parsed.command, "cmd");
    }

    #[test]
    fn result_record_truncates_to_fit_the_bound() {
        let huge_output = "x".repeat(MAX_RECORD_BYTES * 2);
        let record = ResultRecord::new("t1", "cmd", Status::Success, huge_output);
        let encoded = record.encode();
        assert!(encoded.len() <= MAX_RECORD_BYTES);
    }

    #[test]
    fn parse_rejects_oversized_records() {
        let too_big = vec![b'x'; MAX_RECORD_BYTES + 1];
        assert!(matches!(
            ResultRecord::parse(&too_big),
            Err(ProtocolError::RecordTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn read_frame_returns_none_on_clean_eof() {
        let mut empty: &[u8] = b"";
        assert_eq!(read_frame(&mut empty).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_frame_reads_up_to_newline() {
        let mut data: &[u8] = b"command\techo hi\nTRAILING";
        let frame = read_frame(&mut data).await.unwrap().unwrap();
        assert_eq!(frame, b"command\techo hi\n");
    }
}
