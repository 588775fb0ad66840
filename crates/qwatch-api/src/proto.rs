//! RouterOS API sentence framing.
//!
//! Every word on the wire is prefixed with a variable-length size
//! (1–5 bytes, the high bits of the first byte select the width). A
//! sentence is a run of words closed by a zero-length word. Replies are
//! sentences whose first word is `!re`, `!done`, `!trap`, or `!fatal`.
//!
//! | word length          | encoding                       |
//! |----------------------|--------------------------------|
//! | `< 0x80`             | 1 byte                         |
//! | `< 0x4000`           | 2 bytes, `len \| 0x8000`       |
//! | `< 0x20_0000`        | 3 bytes, `len \| 0xC0_0000`    |
//! | `< 0x1000_0000`      | 4 bytes, `len \| 0xE000_0000`  |
//! | otherwise            | `0xF0` + 4 bytes               |

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::record::Record;

/// Words larger than this are treated as a framing error rather than
/// buffered indefinitely.
pub const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

/// One request or reply: a list of words without the terminating empty word.
pub type Sentence = Vec<String>;

// ── Length prefix ────────────────────────────────────────────────────

/// Append the RouterOS length prefix for a word of `len` bytes.
pub fn encode_length(len: usize, dst: &mut BytesMut) -> Result<(), Error> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Protocol(format!("word of {len} bytes exceeds length encoding")))?;

    if len < 0x80 {
        dst.put_slice(&len.to_be_bytes()[3..]);
    } else if len < 0x4000 {
        dst.put_slice(&(len | 0x8000).to_be_bytes()[2..]);
    } else if len < 0x20_0000 {
        dst.put_slice(&(len | 0xC0_0000).to_be_bytes()[1..]);
    } else if len < 0x1000_0000 {
        dst.put_u32(len | 0xE000_0000);
    } else {
        dst.put_u8(0xF0);
        dst.put_u32(len);
    }
    Ok(())
}

/// Peek a length prefix at the start of `src`.
///
/// Returns `(prefix_len, word_len)`, or `None` if more bytes are needed.
pub fn decode_length(src: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };

    let (prefix_len, high) = if first & 0x80 == 0x00 {
        (1, first)
    } else if first & 0xC0 == 0x80 {
        (2, first & 0x3F)
    } else if first & 0xE0 == 0xC0 {
        (3, first & 0x1F)
    } else if first & 0xF0 == 0xE0 {
        (4, first & 0x0F)
    } else if first == 0xF0 {
        (5, 0)
    } else {
        return Err(Error::Protocol(format!(
            "unsupported length control byte {first:#04x}"
        )));
    };

    let Some(rest) = src.get(1..prefix_len) else {
        return Ok(None);
    };

    let value = rest
        .iter()
        .fold(u32::from(high), |acc, &b| (acc << 8) | u32::from(b));
    let word_len = usize::try_from(value)
        .map_err(|_| Error::Protocol(format!("word length {value} does not fit in memory")))?;

    Ok(Some((prefix_len, word_len)))
}

// ── Codec ────────────────────────────────────────────────────────────

/// `tokio_util` codec turning a byte stream into [`Sentence`]s and back.
///
/// Words of a sentence may arrive across many reads; completed words are
/// held until the terminating empty word is seen.
#[derive(Debug, Default)]
pub struct SentenceCodec {
    partial: Sentence,
}

impl Decoder for SentenceCodec {
    type Item = Sentence;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some((prefix_len, word_len)) = decode_length(src)? {
            if word_len > MAX_WORD_LEN {
                return Err(Error::Protocol(format!(
                    "word of {word_len} bytes exceeds the {MAX_WORD_LEN} byte limit"
                )));
            }

            let frame_len = prefix_len + word_len;
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            src.advance(prefix_len);
            if word_len == 0 {
                return Ok(Some(std::mem::take(&mut self.partial)));
            }

            // Names and comments arrive in the device codepage.
            let word = src.split_to(word_len);
            self.partial.push(String::from_utf8_lossy(&word).into_owned());
        }

        Ok(None)
    }
}

impl Encoder<Sentence> for SentenceCodec {
    type Error = Error;

    fn encode(&mut self, item: Sentence, dst: &mut BytesMut) -> Result<(), Self::Error> {
        for word in &item {
            if word.is_empty() {
                return Err(Error::Protocol("sentence contains an empty word".into()));
            }
            encode_length(word.len(), dst)?;
            dst.put_slice(word.as_bytes());
        }
        dst.put_u8(0);
        Ok(())
    }
}

// ── Replies ──────────────────────────────────────────────────────────

/// A parsed reply sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `!re`: one data record.
    Re(Record),
    /// `!done`: end of the reply. May carry attributes (e.g. `=ret=`).
    Done(Record),
    /// `!trap`: command error; a `!done` follows.
    Trap(Record),
    /// `!fatal`: the device is closing the connection.
    Fatal(String),
}

impl Reply {
    pub fn parse(sentence: Sentence) -> Result<Self, Error> {
        let mut words = sentence.into_iter();
        let kind = words
            .next()
            .ok_or_else(|| Error::Protocol("empty reply sentence".into()))?;

        match kind.as_str() {
            "!re" => Ok(Self::Re(attributes(words))),
            "!done" => Ok(Self::Done(attributes(words))),
            "!trap" => Ok(Self::Trap(attributes(words))),
            "!fatal" => Ok(Self::Fatal(words.collect::<Vec<_>>().join(" "))),
            other => Err(Error::Protocol(format!("unexpected reply word '{other}'"))),
        }
    }
}

/// Collect `=key=value` words into a [`Record`], skipping API attributes
/// such as `.tag=`.
fn attributes(words: impl Iterator<Item = String>) -> Record {
    words
        .filter_map(|word| {
            let body = word.strip_prefix('=')?;
            let (key, value) = body.split_once('=').unwrap_or((body, ""));
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}
