//! Export configuration.

use mailpress_mime::TransferEncoding;

/// Charset used for text parts unless configured otherwise.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Settings a message keeps across [`reset`](crate::Message::reset).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportConfig {
    /// Charset declared on every text part.
    pub charset: String,
    /// Transfer encoding applied to text parts.
    pub encoding: TransferEncoding,
}

impl ExportConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::new()
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            charset: DEFAULT_CHARSET.to_string(),
            encoding: TransferEncoding::QuotedPrintable,
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    /// Creates a builder holding the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the charset.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.charset = charset.into();
        self
    }

    /// Sets the transfer encoding for text parts.
    #[must_use]
    pub const fn encoding(mut self, encoding: TransferEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ExportConfig {
        self.config
    }
}
