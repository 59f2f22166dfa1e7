use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::errors::{FsError, FsResult};

/// Character encodings accepted by the `encoding` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
    Hex,
    Base64,
    Base64url,
    /// Raw bytes, no decoding.
    Buffer,
}

impl Encoding {
    pub fn parse(name: &str) -> FsResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "hex" => Ok(Encoding::Hex),
            "base64" => Ok(Encoding::Base64),
            "base64url" => Ok(Encoding::Base64url),
            "buffer" => Ok(Encoding::Buffer),
            _ => Err(FsError::invalid_value("encoding", "is invalid encoding", name)),
        }
    }

    /// Turn raw bytes into caller-facing contents.
    pub fn decode(self, bytes: Vec<u8>) -> Contents {
        match self {
            Encoding::Buffer => Contents::Bytes(bytes),
            Encoding::Utf8 => Contents::Text(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            }),
            Encoding::Ascii => Contents::Text(bytes.iter().map(|b| (b & 0x7f) as char).collect()),
            Encoding::Latin1 => Contents::Text(bytes.iter().map(|&b| b as char).collect()),
            Encoding::Hex => Contents::Text(hex::encode(bytes)),
            Encoding::Base64 => Contents::Text(STANDARD.encode(bytes)),
            Encoding::Base64url => Contents::Text(URL_SAFE_NO_PAD.encode(bytes)),
        }
    }

    /// Turn caller-supplied text into the bytes to write.
    pub fn encode(self, text: &str) -> FsResult<Vec<u8>> {
        match self {
            Encoding::Utf8 | Encoding::Buffer => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii | Encoding::Latin1 => Ok(text.chars().map(|c| c as u32 as u8).collect()),
            Encoding::Hex => hex::decode(text)
                .map_err(|_| FsError::invalid_value("data", "is not valid hex", text)),
            Encoding::Base64 | Encoding::Base64url => {
                let trimmed = text.trim_end_matches('=');
                STANDARD
                    .decode(text)
                    .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
                    .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
                    .map_err(|_| FsError::invalid_value("data", "is not valid base64", text))
            }
        }
    }
}

/// File contents, path strings or names as text or raw bytes depending on the
/// requested encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Contents {
    Text(String),
    Bytes(Vec<u8>),
}

impl Contents {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Contents::Text(text) => text.as_bytes(),
            Contents::Bytes(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Contents::Text(text) => Some(text),
            Contents::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Contents::Text(text) => text.into_bytes(),
            Contents::Bytes(bytes) => bytes,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Contents::Text(text) => Some(text),
            Contents::Bytes(_) => None,
        }
    }
}

impl PartialEq<&str> for Contents {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases_case_insensitively() {
        assert_eq!(Encoding::parse("UTF-8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::parse("binary").unwrap(), Encoding::Latin1);
        let err = Encoding::parse("utf32").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_VALUE");
    }

    #[test]
    fn decode_respects_encoding() {
        assert_eq!(Encoding::Hex.decode(vec![0xde, 0xad]), "dead");
        assert_eq!(Encoding::Base64.decode(b"hi".to_vec()), "aGk=");
        assert_eq!(
            Encoding::Buffer.decode(vec![1, 2]),
            Contents::Bytes(vec![1, 2])
        );
        assert_eq!(Encoding::Latin1.decode(vec![0xe9]), "\u{e9}");
    }

    #[test]
    fn encode_is_inverse_for_binary_text_forms() {
        assert_eq!(Encoding::Hex.encode("cafe").unwrap(), vec![0xca, 0xfe]);
        assert_eq!(Encoding::Base64.encode("aGk=").unwrap(), b"hi".to_vec());
        assert_eq!(Encoding::Base64.encode("aGk").unwrap(), b"hi".to_vec());
        assert!(Encoding::Hex.encode("zz").is_err());
    }
}
