//! Token decoding: the pull parser that turns buffered bytes into
//! [`Token`]s, one at a time, stopping cleanly on the first incomplete
//! token and leaving the buffer untouched for the caller to retry once
//! more bytes arrive.

use crate::{
    buffer::ReceiveBuffer,
    error::WireError,
    token::{Token, checked_type_byte, TYPE_ABORT, TYPE_BVOCAB, TYPE_BYTES, TYPE_CLOSE,
        TYPE_ERROR, TYPE_FLOAT, TYPE_INT, TYPE_NEG, TYPE_OPEN, TYPE_STRING, TYPE_SVOCAB},
    varint::{digits_to_biguint, digits_to_u64},
    vocab::IncomingVocab,
};

/// Decodes tokens out of a [`ReceiveBuffer`], enforcing a configurable
/// prefix limit.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    prefix_limit: usize,
}

impl Default for TokenDecoder {
    fn default() -> Self {
        Self { prefix_limit: crate::varint::DEFAULT_PREFIX_LIMIT }
    }
}

impl TokenDecoder {
    /// Build a decoder with a specific prefix limit.
    #[must_use]
    pub fn with_prefix_limit(prefix_limit: usize) -> Self {
        Self { prefix_limit }
    }

    /// The configured prefix limit.
    #[must_use]
    pub fn prefix_limit(&self) -> usize {
        self.prefix_limit
    }

    /// Attempt to decode the next token from `buf`.
    ///
    /// Returns `Ok(None)` if `buf` doesn't yet hold a complete token
    /// (nothing is consumed in that case — call again after more bytes
    /// arrive). Returns `Err` on malformed input; the connection should
    /// be considered fatally desynchronized at that point.
    pub fn decode_next(
        &self,
        buf: &mut ReceiveBuffer,
        vocab: &IncomingVocab,
    ) -> Result<Option<Token>, WireError> {
        let Some((header_len, type_byte)) = self.scan_header(buf)? else {
            return Ok(None);
        };

        let total = match type_byte {
            TYPE_FLOAT => {
                if header_len != 0 {
                    return Err(WireError::UnknownTypeByte { byte: type_byte });
                }
                1 + 8
            },
            TYPE_INT | TYPE_NEG | TYPE_OPEN | TYPE_CLOSE | TYPE_ABORT | TYPE_SVOCAB
            | TYPE_BVOCAB => header_len + 1,
            TYPE_BYTES | TYPE_STRING | TYPE_ERROR => {
                let digits = self.peek_digits(buf, header_len);
                let payload_len = digits_to_u64(&digits)? as usize;
                header_len + 1 + payload_len
            },
            other => return Err(WireError::UnknownTypeByte { byte: other }),
        };

        if buf.len() < total {
            return Ok(None);
        }

        let raw = buf.take(total).expect("length checked above");
        let digits = &raw[..header_len];
        let payload = &raw[header_len + 1..];

        let token = match type_byte {
            TYPE_INT => Token::Int(digits_to_biguint(digits)),
            TYPE_NEG => Token::Neg(digits_to_biguint(digits)),
            TYPE_FLOAT => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&raw[1..9]);
                Token::Float(f64::from_be_bytes(arr))
            },
            TYPE_BYTES => Token::Bytes(payload.to_vec()),
            TYPE_STRING => {
                Token::Str(String::from_utf8(payload.to_vec()).map_err(|_| WireError::InvalidUtf8)?)
            },
            TYPE_BVOCAB => {
                let index = digits_to_u64(digits)?;
                Token::Bytes(vocab.lookup(index)?.to_vec())
            },
            TYPE_SVOCAB => {
                let index = digits_to_u64(digits)?;
                let bytes = vocab.lookup(index)?.to_vec();
                Token::Str(String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)?)
            },
            TYPE_OPEN => Token::Open(digits_to_u64(digits)?),
            TYPE_CLOSE => Token::Close(digits_to_u64(digits)?),
            TYPE_ABORT => Token::Abort,
            TYPE_ERROR => Token::Error(
                String::from_utf8(payload.to_vec()).map_err(|_| WireError::InvalidUtf8)?,
            ),
            other => return Err(WireError::UnknownTypeByte { byte: other }),
        };

        Ok(Some(token))
    }

    /// Scan (without consuming) the header bytes preceding the next type
    /// byte. Returns `(header_len, type_byte)` once the type byte is
    /// visible, `Ok(None)` if buffered data runs out first, or `Err` if
    /// the prefix limit is exceeded.
    fn scan_header(&self, buf: &ReceiveBuffer) -> Result<Option<(usize, u8)>, WireError> {
        let mut count = 0usize;
        loop {
            let Some(byte) = buf.peek_byte(count) else {
                return Ok(None);
            };
            if byte & 0x80 != 0 {
                let type_byte = checked_type_byte(byte)?;
                return Ok(Some((count, type_byte)));
            }
            count += 1;
            if count > self.prefix_limit {
                return Err(WireError::PrefixLimitExceeded { limit: self.prefix_limit });
            }
        }
    }

    fn peek_digits(&self, buf: &ReceiveBuffer, header_len: usize) -> Vec<u8> {
        (0..header_len)
            .map(|i| buf.peek_byte(i).unwrap_or(0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{token::TYPE_STRING, vocab::VocabTableIndex};

    fn decode_all(bytes: &[u8], vocab: &IncomingVocab) -> Vec<Token> {
        let decoder = TokenDecoder::default();
        let mut buf = ReceiveBuffer::new();
        buf.append(Bytes::copy_from_slice(bytes));
        let mut tokens = Vec::new();
        while let Some(tok) = decoder.decode_next(&mut buf, vocab).unwrap() {
            tokens.push(tok);
        }
        tokens
    }

    #[test]
    fn decodes_small_int() {
        let vocab = IncomingVocab::from_initial(VocabTableIndex::V0);
        let tokens = decode_all(&[1u8, TYPE_INT], &vocab);
        assert_eq!(tokens, vec![Token::Int(1u32.into())]);
    }

    #[test]
    fn incomplete_token_returns_none_and_preserves_buffer() {
        let vocab = IncomingVocab::from_initial(VocabTableIndex::V0);
        let decoder = TokenDecoder::default();
        let mut buf = ReceiveBuffer::new();
        buf.append(Bytes::from_static(&[3u8, TYPE_STRING, b'h', b'i']));
        assert_eq!(decoder.decode_next(&mut buf, &vocab).unwrap(), None);
        assert_eq!(buf.len(), 4);
        buf.append(Bytes::from_static(b"!"));
        let tok = decoder.decode_next(&mut buf, &vocab).unwrap().unwrap();
        assert_eq!(tok, Token::Str("hi!".to_string()));
    }

    #[test]
    fn prefix_limit_is_enforced() {
        let vocab = IncomingVocab::from_initial(VocabTableIndex::V0);
        let decoder = TokenDecoder::with_prefix_limit(64);
        let mut buf = ReceiveBuffer::new();
        let mut bytes = vec![0u8; 66];
        bytes.push(TYPE_STRING);
        buf.append(Bytes::from(bytes));
        let err = decoder.decode_next(&mut buf, &vocab).unwrap_err();
        assert_eq!(err, WireError::PrefixLimitExceeded { limit: 64 });
    }

    #[test]
    fn bvocab_resolves_through_incoming_table() {
        let vocab = IncomingVocab::from_initial(VocabTableIndex::V1);
        // index 4 is "list" in VOCAB_V1
        let tokens = decode_all(&[4u8, TYPE_BVOCAB], &vocab);
        assert_eq!(tokens, vec![Token::Bytes(b"list".to_vec())]);
    }
}
