//! Decides which multipart wrappers a message needs.

use std::fmt;

/// Kind of multipart wrapper.
///
/// Variants are ordered from outermost to innermost; a section may only be
/// nested inside a section of a lower kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MultipartKind {
    /// Separates the displayed content from attachments.
    Mixed,
    /// Binds embedded resources to the displayed content.
    Related,
    /// Offers equivalent representations of the same content.
    Alternative,
}

impl MultipartKind {
    /// All kinds, outermost first.
    pub const ALL: [Self; 3] = [Self::Mixed, Self::Related, Self::Alternative];

    /// The `multipart/` subtype.
    #[must_use]
    pub const fn subtype(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Related => "related",
            Self::Alternative => "alternative",
        }
    }
}

impl fmt::Display for MultipartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multipart/{}", self.subtype())
    }
}

/// The multipart wrappers required by a message.
///
/// A wrapper is only needed when there is something to separate: a lone
/// attachment needs no `multipart/mixed` envelope, while two parts are
/// alternatives of one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Structure {
    /// `multipart/mixed` is needed.
    pub mixed: bool,
    /// `multipart/related` is needed.
    pub related: bool,
    /// `multipart/alternative` is needed.
    pub alternative: bool,
}

impl Structure {
    /// Classifies a message by its number of parts, embedded files and
    /// attachments.
    #[must_use]
    pub const fn classify(parts: usize, embedded: usize, attachments: usize) -> Self {
        Self {
            mixed: (parts > 0 && attachments > 0) || attachments > 1,
            related: (parts > 0 && embedded > 0) || embedded > 1,
            alternative: parts > 1,
        }
    }

    /// Returns true if the given wrapper is needed.
    #[must_use]
    pub const fn needs(self, kind: MultipartKind) -> bool {
        match kind {
            MultipartKind::Mixed => self.mixed,
            MultipartKind::Related => self.related,
            MultipartKind::Alternative => self.alternative,
        }
    }

    /// The needed wrappers, outermost first.
    pub fn wrappers(self) -> impl Iterator<Item = MultipartKind> {
        MultipartKind::ALL.into_iter().filter(move |&kind| self.needs(kind))
    }

    /// Number of nested sections.
    #[must_use]
    pub fn depth(self) -> usize {
        self.wrappers().count()
    }
}
