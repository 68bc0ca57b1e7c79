//! Screen state and the reducer that drives it.
//!
//! Every change to what the screen shows is expressed as a [`ViewEvent`] and
//! folded into a [`ViewState`] by [`reduce`]. [`Display`] is the single place
//! that applies events, so callbacks finishing in any order still mutate the
//! screen one event at a time.

use crate::domain::{ApodRecord, DateKey};
use crate::services::media::Bitmap;
use crate::utils::strip_newlines;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

pub const APOD_WEBSITE: &str = "https://apod.nasa.gov/apod/";

/// Help text behind the info button.
pub const INSTRUCTION_TEXT: &str = "Every day NASA publishes a picture or video of our universe \
with an explanation written by a professional astronomer. Pick any day since June 16, 1995 \
from the calendar to see its entry, and tap the title to show or hide the explanation. \
An API key from api.nasa.gov is needed the first time.";

/// Most recent notices kept for the display.
pub const MAX_NOTICES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingCredential,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaView {
    None,
    /// Previous picture dropped, new one in flight.
    Clearing,
    Image {
        url: String,
        width: u32,
        height: u32,
    },
    Placeholder,
    Video {
        url: String,
        controls: bool,
        autoplay: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    DataLoadFailed,
    MediaLoadFailed,
    UnknownMediaType,
    CredentialSaved,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind) -> Self {
        let message = match kind {
            NoticeKind::DataLoadFailed => "Failed to load data",
            NoticeKind::MediaLoadFailed => "Failed to load media",
            NoticeKind::UnknownMediaType => "Unknown media type",
            NoticeKind::CredentialSaved => "API key saved",
        };
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarBounds {
    pub min: DateKey,
    pub max: DateKey,
}

/// Text shown once metadata arrives, before any translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLabels {
    pub date_label: String,
    pub version_label: String,
    pub title: String,
    pub explanation: String,
    pub copyright_label: Option<String>,
}

impl MetadataLabels {
    pub fn from_record(record: &ApodRecord) -> Self {
        Self {
            date_label: record.date.clone(),
            version_label: format!("Service version: {}", record.service_version),
            title: record.title.clone(),
            explanation: record.explanation.clone(),
            copyright_label: record
                .copyright
                .as_deref()
                .map(|c| format!("Copyright: {}", strip_newlines(c))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub phase: Phase,
    pub progress_visible: bool,
    pub date_label: String,
    pub version_label: String,
    pub title: String,
    pub explanation: String,
    pub copyright_label: Option<String>,
    pub media: MediaView,
    pub explanation_visible: bool,
    pub calendar_visible: bool,
    pub calendar_bounds: CalendarBounds,
    pub website_url: &'static str,
    pub info_text: &'static str,
    pub notices: Vec<Notice>,
    #[serde(skip)]
    pub bitmap: Option<Arc<Bitmap>>,
}

impl ViewState {
    pub fn initial(today: DateKey) -> Self {
        Self {
            phase: Phase::Loading,
            progress_visible: true,
            date_label: String::new(),
            version_label: String::new(),
            title: String::new(),
            explanation: String::new(),
            copyright_label: None,
            media: MediaView::None,
            explanation_visible: false,
            calendar_visible: false,
            calendar_bounds: CalendarBounds {
                min: DateKey::first(),
                max: today,
            },
            website_url: APOD_WEBSITE,
            info_text: INSTRUCTION_TEXT,
            notices: Vec::new(),
            bitmap: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ViewEvent {
    CredentialRequested,
    Loading,
    MetadataApplied(MetadataLabels),
    TitleTranslated(String),
    ExplanationTranslated(String),
    ImageCleared,
    ImageReady { url: String, bitmap: Arc<Bitmap> },
    ImagePlaceholder(Arc<Bitmap>),
    VideoBound { url: String },
    Loaded,
    Notice(Notice),
    ExplanationToggled,
    CalendarToggled,
    /// The calendar's last selectable day moved.
    DayChanged(DateKey),
}

/// Fold one event into the screen state.
pub fn reduce(mut state: ViewState, event: ViewEvent) -> ViewState {
    match event {
        ViewEvent::CredentialRequested => {
            state.phase = Phase::AwaitingCredential;
            state.progress_visible = false;
        }
        ViewEvent::Loading => {
            state.phase = Phase::Loading;
            state.progress_visible = true;
            state.explanation_visible = false;
            state.calendar_visible = false;
            state.media = MediaView::None;
            state.bitmap = None;
        }
        ViewEvent::MetadataApplied(labels) => {
            state.date_label = labels.date_label;
            state.version_label = labels.version_label;
            state.title = labels.title;
            state.explanation = labels.explanation;
            state.copyright_label = labels.copyright_label;
        }
        ViewEvent::TitleTranslated(text) => state.title = text,
        ViewEvent::ExplanationTranslated(text) => state.explanation = text,
        ViewEvent::ImageCleared => {
            state.media = MediaView::Clearing;
            state.bitmap = None;
        }
        ViewEvent::ImageReady { url, bitmap } => {
            state.media = MediaView::Image {
                url,
                width: bitmap.width,
                height: bitmap.height,
            };
            state.bitmap = Some(bitmap);
            state.progress_visible = false;
        }
        ViewEvent::ImagePlaceholder(bitmap) => {
            state.media = MediaView::Placeholder;
            state.bitmap = Some(bitmap);
            state.progress_visible = false;
        }
        ViewEvent::VideoBound { url } => {
            state.media = MediaView::Video {
                url,
                controls: true,
                autoplay: true,
            };
            state.bitmap = None;
            state.progress_visible = false;
        }
        ViewEvent::Loaded => {
            state.phase = Phase::Loaded;
            state.explanation_visible = true;
            // an image still in flight keeps the spinner until it resolves
            state.progress_visible = state.media == MediaView::Clearing;
        }
        ViewEvent::Notice(notice) => {
            state.notices.push(notice);
            if state.notices.len() > MAX_NOTICES {
                let excess = state.notices.len() - MAX_NOTICES;
                state.notices.drain(..excess);
            }
        }
        ViewEvent::ExplanationToggled => state.explanation_visible = !state.explanation_visible,
        ViewEvent::CalendarToggled => state.calendar_visible = !state.calendar_visible,
        ViewEvent::DayChanged(today) => state.calendar_bounds.max = today,
    }
    state
}

/// Publishes the screen state to any number of readers.
#[derive(Clone)]
pub struct Display {
    tx: Arc<watch::Sender<ViewState>>,
}

impl Display {
    pub fn new(initial: ViewState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn apply(&self, event: ViewEvent) {
        self.tx.send_modify(|state| {
            let current = std::mem::replace(state, ViewState::initial(DateKey::first()));
            *state = reduce(current, event);
        });
    }

    pub fn snapshot(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }
}
