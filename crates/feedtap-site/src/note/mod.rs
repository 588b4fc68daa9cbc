//! Reader for the open note detail.
//!
//! One evaluation walks the note container, stamps every element the host
//! may want to click later, and returns texts, slides and the comment tree.

mod comment;
mod error;
mod video;

use std::sync::Arc;

use feedtap_browser::element::REF_ATTRIBUTE;
use feedtap_browser::{Bridge, ElementRef, MediaCapture};
use feedtap_config::NoteSelectors;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub use comment::{Comment, TextElement};
pub use error::NoteError;
pub use video::{ReadyState, Video};

use comment::{RawComment, RawField};
use error::remote;

const READ: &str = r#"(sel, refAttribute) => {
    const root = document.querySelector(sel.container);
    if (!root) return null;
    const stamp = (el) => {
        let tag = el.getAttribute(refAttribute);
        if (!tag) {
            window.__feedtapRefSeq = (window.__feedtapRefSeq || 0) + 1;
            tag = 'note-' + window.__feedtapRefSeq;
            el.setAttribute(refAttribute, tag);
        }
        return tag;
    };
    const field = (scope, s) => {
        const el = scope.querySelector(s);
        return el ? { ref: stamp(el), text: (el.textContent || '').trim() } : null;
    };
    const c = sel.comments;
    const comment = (el) => ({
        author: field(el, c.author),
        content: field(el, c.content),
        images: Array.from(el.querySelectorAll(c.images)).map((img) => img.getAttribute('src')),
        date: field(el, c.date),
        like: field(el, c.like),
        reply: field(el, c.reply),
    });
    return {
        type: root.getAttribute(sel.typeAttribute),
        slides: Array.from(root.querySelectorAll(sel.slides)).map((slide) => {
            const img = slide.querySelector('img');
            return {
                index: slide.getAttribute('data-index'),
                src: img ? img.getAttribute('src') : null,
                active: slide.classList.contains('swiper-slide-active'),
            };
        }),
        author: field(root, sel.author),
        follow: field(root, sel.follow),
        like: field(root, sel.like),
        collect: field(root, sel.collect),
        title: field(root, sel.title),
        desc: field(root, sel.desc),
        date: field(root, sel.date),
        commentCount: field(root, sel.commentCount),
        comments: Array.from(root.querySelectorAll(c.parent)).map((parent) => ({
            ...comment(parent),
            sub: Array.from(parent.querySelectorAll(c.sub)).map(comment),
            showMore: field(parent, c.showMore),
        })),
    };
}"#;

/// One image of an image note's carousel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slide {
    pub index: i64,
    pub image_url: String,
    pub active: bool,
}

/// What the note shows on its media side.
#[derive(Debug, Clone)]
pub enum NoteMedia {
    ImageCarousel(Vec<Slide>),
    Video(Video),
}

/// Everything readable from an open note.
#[derive(Debug, Clone)]
pub struct NoteDetail {
    pub media: NoteMedia,
    pub author: Option<TextElement>,
    pub follow: Option<TextElement>,
    pub like: Option<TextElement>,
    pub collect: Option<TextElement>,
    pub title: Option<TextElement>,
    pub desc: Option<TextElement>,
    pub date: Option<TextElement>,
    pub comment_count: Option<TextElement>,
    pub comments: Vec<Comment>,
}

impl NoteDetail {
    pub fn is_video(&self) -> bool {
        matches!(self.media, NoteMedia::Video(_))
    }

    pub fn video(&self) -> Option<&Video> {
        match &self.media {
            NoteMedia::Video(video) => Some(video),
            NoteMedia::ImageCarousel(_) => None,
        }
    }

    pub fn slides(&self) -> &[Slide] {
        match &self.media {
            NoteMedia::ImageCarousel(slides) => slides,
            NoteMedia::Video(_) => &[],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawNote {
    #[serde(rename = "type")]
    kind: Option<String>,
    slides: Vec<RawSlide>,
    author: Option<RawField>,
    follow: Option<RawField>,
    like: Option<RawField>,
    collect: Option<RawField>,
    title: Option<RawField>,
    desc: Option<RawField>,
    date: Option<RawField>,
    comment_count: Option<RawField>,
    comments: Vec<RawComment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSlide {
    index: Option<String>,
    src: Option<String>,
    active: bool,
}

/// Reads the note detail overlay.
pub struct NoteReader {
    bridge: Arc<Bridge>,
    capture: Arc<MediaCapture>,
    selectors: NoteSelectors,
}

impl NoteReader {
    pub fn new(bridge: Arc<Bridge>, capture: Arc<MediaCapture>, selectors: NoteSelectors) -> Self {
        Self {
            bridge,
            capture,
            selectors,
        }
    }

    /// Read the currently open note.
    pub async fn read(&self) -> Result<NoteDetail, NoteError> {
        let sel = &self.selectors;
        let c = &sel.comments;
        let args = [
            json!({
                "container": sel.container,
                "typeAttribute": sel.type_attribute,
                "slides": sel.slides,
                "author": sel.author,
                "follow": sel.follow,
                "like": sel.like,
                "collect": sel.collect,
                "title": sel.title,
                "desc": sel.desc,
                "date": sel.date,
                "commentCount": sel.comment_count,
                "comments": {
                    "parent": c.parent,
                    "sub": c.sub,
                    "author": c.author,
                    "content": c.content,
                    "images": c.images,
                    "date": c.date,
                    "like": c.like,
                    "reply": c.reply,
                    "showMore": c.show_more,
                },
            }),
            json!(REF_ATTRIBUTE),
        ];

        let value = self.bridge.evaluate(READ, &args).await.map_err(remote)?;
        if value.is_null() {
            return Err(NoteError::ContainerMissing(sel.container.clone()));
        }
        let raw: RawNote = serde_json::from_value(value)
            .map_err(|e| NoteError::Decode(format!("note: {}", e)))?;

        let media = if raw.kind.as_deref() == Some("video") {
            NoteMedia::Video(self.video())
        } else {
            NoteMedia::ImageCarousel(parse_slides(raw.slides))
        };

        let detail = NoteDetail {
            media,
            author: raw.author.map(Into::into),
            follow: raw.follow.map(Into::into),
            like: raw.like.map(Into::into),
            collect: raw.collect.map(Into::into),
            title: raw.title.map(Into::into),
            desc: raw.desc.map(Into::into),
            date: raw.date.map(Into::into),
            comment_count: raw.comment_count.map(Into::into),
            comments: raw.comments.into_iter().map(Into::into).collect(),
        };

        debug!(
            video = detail.is_video(),
            slides = detail.slides().len(),
            comments = detail.comments.iter().map(Comment::count).sum::<usize>(),
            "note read"
        );
        Ok(detail)
    }

    /// Handle to the note's player, whether or not it has rendered yet.
    pub fn video(&self) -> Video {
        let sel = &self.selectors;
        Video::new(
            self.bridge.clone(),
            self.capture.clone(),
            ElementRef::new(sel.container.as_str()).child(&sel.player),
            &sel.video,
            &sel.muted,
            &sel.volume_toggle,
        )
    }
}

fn parse_slides(raw: Vec<RawSlide>) -> Vec<Slide> {
    raw.into_iter()
        .filter_map(|slide| {
            let index = slide.index?.trim().parse().ok()?;
            let image_url = slide.src.filter(|s| !s.is_empty())?;
            Some(Slide {
                index,
                image_url,
                active: slide.active,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "note_tests.rs"]
mod tests;
