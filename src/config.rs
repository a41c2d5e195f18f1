//! Encoder and export configuration.
//!
//! [`EncoderConfig`] holds the four output symbols and is validated once, before
//! streaming starts. [`ExportOptions`] adds the pipeline knobs (header row and
//! flush threshold). [`Settings`] is the loose, serde-backed form used by the
//! command line and by JSON settings files: every field is optional, layers are
//! merged with [`Settings::merge`], and [`Settings::into_options`] validates the
//! result.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Amount of encoded output buffered between flushes (25 MiB).
pub const DEFAULT_FLUSH_THRESHOLD: usize = 26_214_400;

pub const DEFAULT_DELIMITER: u8 = b',';
pub const DEFAULT_QUOTE: u8 = b'"';
pub const DEFAULT_ESCAPE: u8 = b'\\';
pub const DEFAULT_TERMINATOR: &[u8] = b"\n";

/// Output symbols for the encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    delimiter: u8,
    quote: Option<u8>,
    escape: u8,
    terminator: Vec<u8>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            quote: Some(DEFAULT_QUOTE),
            escape: DEFAULT_ESCAPE,
            terminator: DEFAULT_TERMINATOR.to_vec(),
        }
    }
}

impl EncoderConfig {
    /// Build a configuration from user-facing strings.
    ///
    /// `delimiter` and `escape` must be exactly one single-byte character.
    /// `quote` must be one single-byte character, or empty to disable quoting.
    /// `terminator` is decoded with [`decode_terminator`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] for any symbol that is not a single byte, or when
    /// the delimiter collides with the quote or escape symbol.
    pub fn new(
        delimiter: &str,
        quote: &str,
        escape: &str,
        terminator: &str,
    ) -> Result<Self, ConfigError> {
        let delimiter = parse_symbol("delimiter", delimiter)?;
        let quote = if quote.is_empty() {
            None
        } else {
            Some(parse_symbol("quote", quote)?)
        };
        let escape = parse_symbol("escape", escape)?;
        Self::from_bytes(delimiter, quote, escape, decode_terminator(terminator))
    }

    /// Build a configuration from raw symbol bytes.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidSymbol`] for a non-ASCII symbol byte and
    /// [`ConfigError::ConflictingSymbols`] when the delimiter equals the quote or
    /// the escape symbol.
    pub fn from_bytes(
        delimiter: u8,
        quote: Option<u8>,
        escape: u8,
        terminator: impl Into<Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        check_ascii("delimiter", delimiter)?;
        check_ascii("escape", escape)?;
        if let Some(q) = quote {
            check_ascii("quote", q)?;
            if q == delimiter {
                return Err(ConfigError::ConflictingSymbols {
                    first: "delimiter",
                    second: "quote",
                    value: char::from(q),
                });
            }
        }
        if escape == delimiter {
            return Err(ConfigError::ConflictingSymbols {
                first: "delimiter",
                second: "escape",
                value: char::from(escape),
            });
        }
        Ok(Self {
            delimiter,
            quote,
            escape,
            terminator: terminator.into(),
        })
    }

    /// Same configuration with a different delimiter.
    ///
    /// # Errors
    /// See [`EncoderConfig::from_bytes`].
    pub fn with_delimiter(self, delimiter: u8) -> Result<Self, ConfigError> {
        Self::from_bytes(delimiter, self.quote, self.escape, self.terminator)
    }

    /// Same configuration with a different quote symbol; `None` disables quoting.
    ///
    /// # Errors
    /// See [`EncoderConfig::from_bytes`].
    pub fn with_quote(self, quote: Option<u8>) -> Result<Self, ConfigError> {
        Self::from_bytes(self.delimiter, quote, self.escape, self.terminator)
    }

    /// Same configuration with a different escape symbol.
    ///
    /// # Errors
    /// See [`EncoderConfig::from_bytes`].
    pub fn with_escape(self, escape: u8) -> Result<Self, ConfigError> {
        Self::from_bytes(self.delimiter, self.quote, escape, self.terminator)
    }

    /// Same configuration with a different line terminator, taken verbatim.
    #[must_use]
    pub fn with_terminator(mut self, terminator: impl Into<Vec<u8>>) -> Self {
        self.terminator = terminator.into();
        self
    }

    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    #[must_use]
    pub fn quote(&self) -> Option<u8> {
        self.quote
    }

    #[must_use]
    pub fn escape(&self) -> u8 {
        self.escape
    }

    #[must_use]
    pub fn terminator(&self) -> &[u8] {
        &self.terminator
    }

    /// The two bytes written for a null field: escape followed by `N`.
    #[must_use]
    pub fn null_marker(&self) -> [u8; 2] {
        [self.escape, b'N']
    }
}

fn parse_symbol(name: &'static str, value: &str) -> Result<u8, ConfigError> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ConfigError::InvalidSymbol {
            name,
            value: value.to_string(),
        }),
    }
}

fn check_ascii(name: &'static str, b: u8) -> Result<(), ConfigError> {
    if b.is_ascii() {
        Ok(())
    } else {
        Err(ConfigError::InvalidSymbol {
            name,
            value: format!("\\x{b:02x}"),
        })
    }
}

/// Decode a terminator given on the command line.
///
/// The two-character sequences `\n` and `\r` become LF and CR, so `\r\n`
/// yields CRLF. `\\` is a literal backslash. Every other byte is kept as is.
#[must_use]
pub fn decode_terminator(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let decoded = match bytes[i + 1] {
                b'n' => Some(b'\n'),
                b'r' => Some(b'\r'),
                b'\\' => Some(b'\\'),
                _ => None,
            };
            if let Some(b) = decoded {
                out.push(b);
                i += 2;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Validated options for one export run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub encoder: EncoderConfig,
    /// Emit the column names as the first line.
    pub header: bool,
    /// Flush the sink once more than this many bytes are pending.
    pub flush_threshold: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            header: true,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl ExportOptions {
    #[must_use]
    pub fn new(encoder: EncoderConfig) -> Self {
        Self {
            encoder,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes;
        self
    }
}

/// Loose settings, as read from a JSON file or the command line.
///
/// ```
/// use rawcsv::config::Settings;
///
/// let file: Settings = serde_json::from_str(r#"{ "delimiter": "|", "header": false }"#).unwrap();
/// let cli = Settings { quote: Some(String::new()), ..Settings::default() };
/// let opts = file.merge(cli).into_options().unwrap();
/// assert_eq!(opts.encoder.delimiter(), b'|');
/// assert_eq!(opts.encoder.quote(), None);
/// assert!(!opts.header);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub delimiter: Option<String>,
    pub quote: Option<String>,
    pub escape: Option<String>,
    pub terminator: Option<String>,
    pub header: Option<bool>,
    pub flush_threshold: Option<usize>,
    pub null_token: Option<String>,
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns [`ConfigError::SettingsIo`] or [`ConfigError::SettingsParse`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsIo {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::SettingsParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Layer `over` on top of `self`; any value set in `over` wins.
    #[must_use]
    pub fn merge(self, over: Settings) -> Settings {
        Settings {
            delimiter: over.delimiter.or(self.delimiter),
            quote: over.quote.or(self.quote),
            escape: over.escape.or(self.escape),
            terminator: over.terminator.or(self.terminator),
            header: over.header.or(self.header),
            flush_threshold: over.flush_threshold.or(self.flush_threshold),
            null_token: over.null_token.or(self.null_token),
        }
    }

    /// Validate into [`ExportOptions`], filling unset values with defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid symbols or a zero flush threshold.
    pub fn into_options(self) -> Result<ExportOptions, ConfigError> {
        let encoder = EncoderConfig::new(
            self.delimiter.as_deref().unwrap_or(","),
            self.quote.as_deref().unwrap_or("\""),
            self.escape.as_deref().unwrap_or("\\"),
            self.terminator.as_deref().unwrap_or("\\n"),
        )?;
        let flush_threshold = self.flush_threshold.unwrap_or(DEFAULT_FLUSH_THRESHOLD);
        if flush_threshold == 0 {
            return Err(ConfigError::ZeroFlushThreshold);
        }
        Ok(ExportOptions {
            encoder,
            header: self.header.unwrap_or(true),
            flush_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mysql_style_output() {
        let cfg = EncoderConfig::default();
        assert_eq!(cfg.delimiter(), b',');
        assert_eq!(cfg.quote(), Some(b'"'));
        assert_eq!(cfg.escape(), b'\\');
        assert_eq!(cfg.terminator(), b"\n");
        assert_eq!(&cfg.null_marker(), b"\\N");
    }

    #[test]
    fn empty_quote_disables_quoting() {
        let cfg = EncoderConfig::new(",", "", "\\", "\\n").unwrap();
        assert_eq!(cfg.quote(), None);
    }

    #[test]
    fn rejects_multi_character_symbols() {
        let err = EncoderConfig::new(",,", "\"", "\\", "\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSymbol { name: "delimiter", .. }));

        let err = EncoderConfig::new(",", "\"", "", "\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSymbol { name: "escape", .. }));
    }

    #[test]
    fn rejects_multi_byte_character() {
        let err = EncoderConfig::new("§", "\"", "\\", "\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSymbol { name: "delimiter", .. }));
        assert!(EncoderConfig::from_bytes(0xA7, None, b'\\', "\n").is_err());
    }

    #[test]
    fn rejects_delimiter_colliding_with_quote_or_escape() {
        assert!(matches!(
            EncoderConfig::new("\"", "\"", "\\", "\n"),
            Err(ConfigError::ConflictingSymbols { second: "quote", .. })
        ));
        assert!(matches!(
            EncoderConfig::new("\\", "\"", "\\", "\n"),
            Err(ConfigError::ConflictingSymbols { second: "escape", .. })
        ));
        // Quote doubling style is allowed.
        assert!(EncoderConfig::new(",", "\"", "\"", "\n").is_ok());
    }

    #[test]
    fn terminator_escapes_are_decoded() {
        assert_eq!(decode_terminator("\\n"), b"\n");
        assert_eq!(decode_terminator("\\r\\n"), b"\r\n");
        assert_eq!(decode_terminator("\\r"), b"\r");
        assert_eq!(decode_terminator("\n"), b"\n");
        assert_eq!(decode_terminator("|\\\\"), b"|\\");
        assert_eq!(decode_terminator("\\t"), b"\\t");
        assert_eq!(decode_terminator("\\"), b"\\");
    }

    #[test]
    fn settings_merge_prefers_override() {
        let base = Settings {
            delimiter: Some("|".into()),
            header: Some(false),
            ..Settings::default()
        };
        let over = Settings {
            delimiter: Some(";".into()),
            ..Settings::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.delimiter.as_deref(), Some(";"));
        assert_eq!(merged.header, Some(false));
    }

    #[test]
    fn settings_reject_zero_threshold() {
        let s = Settings {
            flush_threshold: Some(0),
            ..Settings::default()
        };
        assert!(matches!(s.into_options(), Err(ConfigError::ZeroFlushThreshold)));
    }

    #[test]
    fn settings_defaults_produce_default_options() {
        assert_eq!(Settings::default().into_options().unwrap(), ExportOptions::default());
    }

    #[test]
    fn settings_file_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "delimiter": "\t", "terminator": "\\r\\n" }"#)?;
        let opts = Settings::from_json_file(&path)?.into_options()?;
        assert_eq!(opts.encoder.delimiter(), b'\t');
        assert_eq!(opts.encoder.terminator(), b"\r\n");

        std::fs::write(&path, r#"{ "delimter": "," }"#)?;
        assert!(matches!(
            Settings::from_json_file(&path),
            Err(ConfigError::SettingsParse { .. })
        ));
        Ok(())
    }
}
