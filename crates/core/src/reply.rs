//! Result shapes handed to the chat front end.
//!
//! [`Reply`] is an explicit tagged union over everything the front end can
//! render, so callers match on the variant instead of probing for fields.
//! [`Lookup`] separates "nothing there" from transport failures, which stay
//! in the surrounding `Result`.

/// Where a media reply's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// The front end lets the chat service fetch the URL itself.
    Url(String),
    /// Bytes uploaded under the given file name.
    Upload { filename: String, bytes: Vec<u8> },
}

impl MediaSource {
    pub fn upload(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Upload {
            filename: filename.into(),
            bytes,
        }
    }
}

/// A renderable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Photo {
        media: MediaSource,
        caption: Option<String>,
    },
    Animation {
        media: MediaSource,
        caption: Option<String>,
    },
    Document {
        media: MediaSource,
        caption: Option<String>,
    },
    Text {
        body: String,
        /// Render in a monospace block (command output).
        monospace: bool,
    },
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            body: body.into(),
            monospace: false,
        }
    }

    pub fn monospace(body: impl Into<String>) -> Self {
        Self::Text {
            body: body.into(),
            monospace: true,
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            Self::Photo { caption, .. }
            | Self::Animation { caption, .. }
            | Self::Document { caption, .. } => caption.as_deref(),
            Self::Text { .. } => None,
        }
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Photo { .. } => "photo",
            Self::Animation { .. } => "animation",
            Self::Document { .. } => "document",
            Self::Text { .. } => "text",
        }
    }
}

/// Outcome of a lookup that reached its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::NotFound => Lookup::NotFound,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_is_only_on_media() {
        let doc = Reply::Document {
            media: MediaSource::upload("out.txt", b"x".to_vec()),
            caption: Some("too long".into()),
        };
        assert_eq!(doc.caption(), Some("too long"));
        assert_eq!(Reply::text("hi").caption(), None);
        assert_eq!(doc.kind(), "document");
    }

    #[test]
    fn lookup_maps_and_converts() {
        let found: Lookup<u8> = Some(3).into();
        assert_eq!(found.clone().map(|v| v * 2), Lookup::Found(6));
        assert!(found.is_found());
        let missing: Lookup<u8> = None.into();
        assert_eq!(missing.into_option(), None);
    }
}
