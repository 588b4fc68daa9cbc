//! Comment tree under a note.

use feedtap_browser::ElementRef;
use serde::{Deserialize, Serialize};

/// Text read from an element, plus a reference to click it later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextElement {
    pub text: String,
    pub element: ElementRef,
}

/// One comment. Parent comments carry their replies in `sub_comments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub author: Option<TextElement>,
    pub content: Option<TextElement>,
    pub image_urls: Vec<String>,
    /// Date and location, as the page prints them.
    pub date: Option<TextElement>,
    pub like: Option<TextElement>,
    pub reply: Option<TextElement>,
    pub sub_comments: Vec<Comment>,
    /// "Show more replies" control, present only on parents with hidden replies.
    pub show_more: Option<TextElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawField {
    #[serde(rename = "ref")]
    pub tag: String,
    #[serde(default)]
    pub text: String,
}

impl From<RawField> for TextElement {
    fn from(raw: RawField) -> Self {
        Self {
            text: raw.text,
            element: ElementRef::tagged(&raw.tag),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawComment {
    pub author: Option<RawField>,
    pub content: Option<RawField>,
    pub images: Vec<Option<String>>,
    pub date: Option<RawField>,
    pub like: Option<RawField>,
    pub reply: Option<RawField>,
    pub sub: Vec<RawComment>,
    pub show_more: Option<RawField>,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        Self {
            author: raw.author.map(Into::into),
            content: raw.content.map(Into::into),
            image_urls: raw
                .images
                .into_iter()
                .flatten()
                .filter(|src| !src.is_empty())
                .collect(),
            date: raw.date.map(Into::into),
            like: raw.like.map(Into::into),
            reply: raw.reply.map(Into::into),
            sub_comments: raw.sub.into_iter().map(Into::into).collect(),
            show_more: raw.show_more.map(Into::into),
        }
    }
}

impl Comment {
    /// This comment and all replies below it.
    pub fn count(&self) -> usize {
        1 + self.sub_comments.iter().map(Comment::count).sum::<usize>()
    }
}
