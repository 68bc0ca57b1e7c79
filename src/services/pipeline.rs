//! APOD fetch-and-present pipeline.
//!
//! One load runs: metadata fetch, then concurrently the two translations and
//! the media step. Every visible effect goes through [`Display::apply`].
//!
//! Loads are not cancelled by newer selections unless the orchestrator was
//! built with `supersede_stale_loads`; by default results land in arrival
//! order, so a slow earlier load can overwrite a newer one.

use crate::clients::{ApodSource, MediaSource, Translator};
use crate::config::ImageBounds;
use crate::domain::{ApodRecord, DateKey, MediaType};
use crate::errors::{PipelineError, PipelineResult};
use crate::repo::CredentialStore;
use crate::services::media::{decode_scaled, placeholder, Bitmap};
use crate::services::prompt::CredentialPrompt;
use crate::view::{Display, MetadataLabels, Notice, NoticeKind, Phase, ViewEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Identifies one load and tells whether a newer one replaced it.
#[derive(Clone, Debug)]
pub struct LoadTicket {
    pub generation: u64,
    latest: Arc<AtomicU64>,
    supersede: bool,
}

impl LoadTicket {
    pub fn is_superseded(&self) -> bool {
        self.supersede && self.latest.load(Ordering::SeqCst) != self.generation
    }
}

/// Hands out load tickets in selection order.
pub struct LoadTracker {
    latest: Arc<AtomicU64>,
    supersede: bool,
}

impl LoadTracker {
    pub fn new(supersede: bool) -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            supersede,
        }
    }

    /// Issuing a ticket supersedes every earlier one.
    pub fn issue(&self) -> LoadTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            generation,
            latest: Arc::clone(&self.latest),
            supersede: self.supersede,
        }
    }
}

/// How a load resolved once metadata was in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    MetadataFailed,
    ImageRequested,
    VideoBound,
    UnknownMediaType,
}

/// A load whose metadata step finished; sub-tasks may still be running.
#[derive(Debug)]
pub struct LoadHandle {
    pub generation: u64,
    pub outcome: LoadOutcome,
    pub record: Option<ApodRecord>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoadHandle {
    /// Wait for translations and the image fetch.
    pub async fn finished(self) -> LoadOutcome {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("load {} sub-task failed: {}", self.generation, e);
            }
        }
        self.outcome
    }
}

#[derive(Debug, Clone, Copy)]
enum TextField {
    Title,
    Explanation,
}

impl TextField {
    fn event(self, text: String) -> ViewEvent {
        match self {
            TextField::Title => ViewEvent::TitleTranslated(text),
            TextField::Explanation => ViewEvent::ExplanationTranslated(text),
        }
    }
}

/// Collaborators the orchestrator drives.
pub struct Collaborators {
    pub apod: Arc<dyn ApodSource>,
    pub media: Arc<dyn MediaSource>,
    pub translator: Arc<dyn Translator>,
    pub store: Arc<dyn CredentialStore>,
    pub prompt: Arc<dyn CredentialPrompt>,
}

/// Drives the screen for one session.
pub struct Orchestrator {
    apod: Arc<dyn ApodSource>,
    media: Arc<dyn MediaSource>,
    translator: Arc<dyn Translator>,
    store: Arc<dyn CredentialStore>,
    prompt: Arc<dyn CredentialPrompt>,
    display: Display,
    image_bounds: ImageBounds,
    /// Set once the session's API key is known; no load starts before.
    credential: OnceLock<String>,
    tracker: LoadTracker,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        display: Display,
        image_bounds: ImageBounds,
        supersede_stale_loads: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            apod: collaborators.apod,
            media: collaborators.media,
            translator: collaborators.translator,
            store: collaborators.store,
            prompt: collaborators.prompt,
            display,
            image_bounds,
            credential: OnceLock::new(),
            tracker: LoadTracker::new(supersede_stale_loads),
        })
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Resolve the API key, prompting once if none is stored, then load today.
    ///
    /// Returns `None` when the prompt went away without an answer.
    pub async fn ensure_credential(self: &Arc<Self>) -> PipelineResult<Option<LoadHandle>> {
        let stored = self.store.get().await?.filter(|key| !key.is_empty());

        let key = match stored {
            Some(key) => key,
            None => {
                info!("no API key stored, prompting");
                self.display.apply(ViewEvent::CredentialRequested);

                let Some(entered) = self.prompt.request_credential().await else {
                    warn!("credential prompt closed without an answer");
                    return Ok(None);
                };

                self.store.set(&entered).await?;
                info!("API key saved");
                self.display
                    .apply(ViewEvent::Notice(Notice::new(NoticeKind::CredentialSaved)));
                self.display.apply(ViewEvent::Loading);
                entered
            }
        };

        if self.credential.set(key).is_err() {
            debug!("credential already resolved for this session");
        }
        Ok(Some(self.load_today().await))
    }

    pub async fn load_today(self: &Arc<Self>) -> LoadHandle {
        self.fetch_metadata(DateKey::today()).await
    }

    /// Switch to loading and start a load for `date` without waiting on it.
    ///
    /// Refused until the credential is resolved.
    pub fn on_date_selected(
        self: &Arc<Self>,
        date: DateKey,
    ) -> PipelineResult<JoinHandle<LoadHandle>> {
        if self.credential.get().is_none() {
            warn!(%date, "date selected before the API key was resolved");
            return Err(PipelineError::CredentialMissing);
        }
        debug!(%date, "date selected");
        self.display.apply(ViewEvent::Loading);

        let ticket = self.tracker.issue();
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.load(date, ticket).await }))
    }

    /// Show or hide the calendar, bounded by the current day.
    pub fn toggle_calendar(&self) -> PipelineResult<()> {
        if self.display.snapshot().phase == Phase::AwaitingCredential {
            return Err(PipelineError::CredentialMissing);
        }
        self.display.apply(ViewEvent::DayChanged(DateKey::today()));
        self.display.apply(ViewEvent::CalendarToggled);
        Ok(())
    }

    pub async fn fetch_metadata(self: &Arc<Self>, date: DateKey) -> LoadHandle {
        let ticket = self.tracker.issue();
        self.load(date, ticket).await
    }

    async fn load(self: &Arc<Self>, date: DateKey, ticket: LoadTicket) -> LoadHandle {
        let api_key = self.credential.get().cloned().unwrap_or_default();

        let record = match self.apod.fetch_metadata(&api_key, date).await {
            Ok(record) => record,
            Err(err) => {
                error!(%date, "metadata fetch failed: {}", err);
                self.emit(
                    &ticket,
                    ViewEvent::Notice(Notice::new(NoticeKind::DataLoadFailed)),
                );
                return LoadHandle {
                    generation: ticket.generation,
                    outcome: LoadOutcome::MetadataFailed,
                    record: None,
                    tasks: Vec::new(),
                };
            }
        };
        info!(%date, title = %record.title, "APOD metadata received");

        self.emit(
            &ticket,
            ViewEvent::MetadataApplied(MetadataLabels::from_record(&record)),
        );

        let mut tasks = vec![
            self.spawn_translation(&ticket, TextField::Title, record.title.clone()),
            self.spawn_translation(&ticket, TextField::Explanation, record.explanation.clone()),
        ];

        let outcome = match &record.media_type {
            MediaType::Image => {
                tasks.push(self.fetch_and_show_image(&ticket, record.media_url.clone()));
                LoadOutcome::ImageRequested
            }
            MediaType::Video => {
                self.emit(
                    &ticket,
                    ViewEvent::VideoBound {
                        url: record.media_url.clone(),
                    },
                );
                LoadOutcome::VideoBound
            }
            MediaType::Unknown(raw) => {
                let err = PipelineError::UnknownMediaType(raw.clone());
                warn!(%date, "{}", err);
                self.emit(
                    &ticket,
                    ViewEvent::Notice(Notice::new(NoticeKind::UnknownMediaType)),
                );
                LoadOutcome::UnknownMediaType
            }
        };

        self.emit(&ticket, ViewEvent::DayChanged(DateKey::today()));
        self.emit(&ticket, ViewEvent::Loaded);

        LoadHandle {
            generation: ticket.generation,
            outcome,
            record: Some(record),
            tasks,
        }
    }

    /// Clear the current picture now, then fetch and decode `url` in the
    /// background.
    fn fetch_and_show_image(self: &Arc<Self>, ticket: &LoadTicket, url: String) -> JoinHandle<()> {
        self.emit(ticket, ViewEvent::ImageCleared);

        let this = Arc::clone(self);
        let ticket = ticket.clone();
        tokio::spawn(async move {
            match this.fetch_image(&url).await {
                Ok(bitmap) => {
                    debug!(url = %url, width = bitmap.width, height = bitmap.height, "image decoded");
                    this.emit(
                        &ticket,
                        ViewEvent::ImageReady {
                            url,
                            bitmap: Arc::new(bitmap),
                        },
                    );
                }
                Err(err) => {
                    error!(url = %url, "{}", err);
                    this.emit(
                        &ticket,
                        ViewEvent::Notice(Notice::new(NoticeKind::MediaLoadFailed)),
                    );
                    this.emit(&ticket, ViewEvent::ImagePlaceholder(Arc::new(placeholder())));
                }
            }
        })
    }

    async fn fetch_image(&self, url: &str) -> PipelineResult<Bitmap> {
        let bytes = self.media.fetch_bytes(url).await?;
        let bounds = self.image_bounds;

        tokio::task::spawn_blocking(move || decode_scaled(&bytes, bounds))
            .await
            .map_err(|e| PipelineError::MediaFetchFailed(e.to_string()))?
            .map_err(|e| PipelineError::MediaFetchFailed(e.to_string()))
    }

    fn spawn_translation(
        self: &Arc<Self>,
        ticket: &LoadTicket,
        field: TextField,
        text: String,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let ticket = ticket.clone();
        tokio::spawn(async move {
            match this.translator.translate(&text).await {
                Ok(translated) => this.emit(&ticket, field.event(translated)),
                Err(e) => {
                    // untranslated text stays on screen
                    let err = PipelineError::from(e);
                    warn!(?field, "{}", err);
                }
            }
        })
    }

    fn emit(&self, ticket: &LoadTicket, event: ViewEvent) {
        if ticket.is_superseded() {
            debug!(generation = ticket.generation, "dropping event from superseded load");
            return;
        }
        self.display.apply(event);
    }
}
