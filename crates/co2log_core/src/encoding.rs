//! Text encodings accepted by the `encoding` option.
//!
//! Labels follow the names build tooling commonly accepts for file I/O
//! (`utf-8`, `latin1`, `ucs2`, ...). Conversions are strict: characters the
//! encoding cannot represent, or bytes it cannot decode, are errors.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default encoding label for persisted artifacts.
pub const DEFAULT_ENCODING_LABEL: &str = "utf-8";

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
}

const SUPPORTED_LABELS: &[&str] = &[
    "utf-8", "utf8", "ascii", "latin1", "binary", "utf16le", "utf-16le", "ucs2", "ucs-2",
];

/// Returns every accepted encoding label.
pub fn supported_encoding_labels() -> &'static [&'static str] {
    SUPPORTED_LABELS
}

impl TextEncoding {
    /// Parses an encoding label, ignoring ASCII case and surrounding space.
    pub fn from_label(label: &str) -> Result<Self, EncodingError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            _ => Err(EncodingError::UnsupportedLabel(label.to_string())),
        }
    }

    /// Canonical label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Utf16Le => "utf16le",
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(EncodingError::Unrepresentable {
                            encoding: self,
                            character: c,
                        })
                    }
                })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| EncodingError::Unrepresentable {
                        encoding: self,
                        character: c,
                    })
                })
                .collect(),
            Self::Utf16Le => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingError> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|err| EncodingError::Malformed {
                    encoding: self,
                    offset: err.utf8_error().valid_up_to(),
                }),
            Self::Ascii => match bytes.iter().position(|byte| !byte.is_ascii()) {
                Some(offset) => Err(EncodingError::Malformed {
                    encoding: self,
                    offset,
                }),
                None => Ok(bytes.iter().map(|byte| char::from(*byte)).collect()),
            },
            Self::Latin1 => Ok(bytes.iter().map(|byte| char::from(*byte)).collect()),
            Self::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(EncodingError::Malformed {
                        encoding: self,
                        offset: bytes.len() - 1,
                    });
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| EncodingError::Malformed {
                    encoding: self,
                    offset: 0,
                })
            }
        }
    }
}

impl Display for TextEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Encoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    UnsupportedLabel(String),
    Unrepresentable {
        encoding: TextEncoding,
        character: char,
    },
    Malformed {
        encoding: TextEncoding,
        offset: usize,
    },
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLabel(label) => write!(
                f,
                "unsupported encoding `{label}`; expected one of {}",
                SUPPORTED_LABELS.join("|")
            ),
            Self::Unrepresentable {
                encoding,
                character,
            } => write!(f, "character {character:?} cannot be encoded as {encoding}"),
            Self::Malformed { encoding, offset } => {
                write!(f, "content is not valid {encoding} (byte offset {offset})")
            }
        }
    }
}

impl Error for EncodingError {}

#[cfg(test)]
mod tests {
    use super::{EncodingError, TextEncoding};

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(TextEncoding::from_label("UTF-8").unwrap(), TextEncoding::Utf8);
        assert_eq!(TextEncoding::from_label(" utf8 ").unwrap(), TextEncoding::Utf8);
        assert_eq!(TextEncoding::from_label("binary").unwrap(), TextEncoding::Latin1);
        assert_eq!(TextEncoding::from_label("ucs2").unwrap(), TextEncoding::Utf16Le);
    }

    #[test]
    fn rejects_unknown_label() {
        let err = TextEncoding::from_label("ebcdic").expect_err("ebcdic is unsupported");
        assert_eq!(err, EncodingError::UnsupportedLabel("ebcdic".to_string()));
    }

    #[test]
    fn ascii_rejects_non_ascii_both_ways() {
        let err = TextEncoding::Ascii.encode("Åland").unwrap_err();
        assert!(matches!(err, EncodingError::Unrepresentable { character: 'Å', .. }));
        let err = TextEncoding::Ascii.decode(&[b'o', b'k', 0xC5]).unwrap_err();
        assert!(matches!(err, EncodingError::Malformed { offset: 2, .. }));
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        let bytes = TextEncoding::Latin1.encode("Åland").unwrap();
        assert_eq!(bytes[0], 0xC5);
        assert_eq!(TextEncoding::Latin1.decode(&bytes).unwrap(), "Åland");
        assert!(TextEncoding::Latin1.encode("€").is_err());
    }

    #[test]
    fn utf16le_restores_rows() {
        let bytes = TextEncoding::Utf16Le.encode("FIN,82.0,1\n").unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(TextEncoding::Utf16Le.decode(&bytes).unwrap(), "FIN,82.0,1\n");
        assert!(TextEncoding::Utf16Le.decode(&bytes[..3]).is_err());
    }

    #[test]
    fn utf8_reports_first_invalid_offset() {
        let err = TextEncoding::Utf8.decode(&[b'a', 0xFF]).unwrap_err();
        assert!(matches!(err, EncodingError::Malformed { offset: 1, .. }));
    }
}
