//! JSON message manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use mailpress_core::{ContentType, ExportConfig, File, FileEncoding, Message, TransferEncoding};
use serde::Deserialize;

/// Message description read from disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Header fields, each with one or more values.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Charset of the text parts.
    pub charset: Option<String>,
    /// Transfer encoding of the text parts.
    pub encoding: Option<TransferEncoding>,
    /// Text parts, plain text first.
    #[serde(default)]
    pub parts: Vec<PartSpec>,
    /// Files referenced from HTML parts.
    #[serde(default)]
    pub embedded: Vec<FileSpec>,
    /// Attached files.
    #[serde(default)]
    pub attachments: Vec<FileSpec>,
}

/// A text part given inline or by path.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartSpec {
    /// Content type without charset, e.g. `text/html`.
    pub content_type: String,
    /// Inline body.
    pub body: Option<String>,
    /// Body read from a file.
    pub path: Option<PathBuf>,
}

/// A file to embed or attach.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    /// Location on disk.
    pub path: PathBuf,
    /// Name shown to the recipient; defaults to the file name.
    pub name: Option<String>,
    /// MIME type; guessed from the extension when absent.
    pub mime_type: Option<String>,
    /// Content-ID for embedded files.
    pub content_id: Option<String>,
    /// The file already holds base64 text.
    #[serde(default)]
    pub pre_encoded: bool,
}

impl Manifest {
    /// Parses a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid manifest")
    }

    /// Export settings requested by the manifest.
    pub fn config(&self) -> ExportConfig {
        let mut builder = ExportConfig::builder();
        if let Some(charset) = &self.charset {
            builder = builder.charset(charset.as_str());
        }
        if let Some(encoding) = self.encoding {
            builder = builder.encoding(encoding);
        }
        builder.build()
    }

    /// Builds the message. Relative paths resolve against `base`.
    pub fn into_message(self, base: &Path) -> Result<Message> {
        let mut message = Message::with_config(self.config());

        message.set_headers(self.headers);

        for part in self.parts {
            let content_type = ContentType::parse(&part.content_type)
                .with_context(|| format!("part content type {:?}", part.content_type))?;
            let body = match (part.body, part.path) {
                (Some(body), None) => body.into_bytes(),
                (None, Some(path)) => {
                    let path = base.join(path);
                    std::fs::read(&path)
                        .with_context(|| format!("failed to read part {}", path.display()))?
                }
                _ => bail!("part {} needs exactly one of `body` or `path`", part.content_type),
            };
            message.add_alternative(content_type, body);
        }

        for spec in self.embedded {
            message.embed(spec.into_file(base)?);
        }
        for spec in self.attachments {
            message.attach(spec.into_file(base)?);
        }

        Ok(message)
    }
}

impl FileSpec {
    fn into_file(self, base: &Path) -> Result<File> {
        let path = base.join(&self.path);
        let mut file = File::from_path(&path)?;

        if let Some(name) = self.name {
            file = file.rename(name);
        }
        if let Some(mime_type) = &self.mime_type {
            let mime_type = ContentType::parse(mime_type)
                .with_context(|| format!("MIME type of {}", path.display()))?;
            file = file.with_mime_type(mime_type);
        }
        if let Some(content_id) = self.content_id {
            file = file.with_content_id(content_id);
        }
        if self.pre_encoded {
            file = file.with_encoding(FileEncoding::Base64PreEncoded);
        }

        Ok(file)
    }
}
