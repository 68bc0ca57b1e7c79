/// Application routes configuration
use crate::handlers::{
    get_view, get_view_image, health, select_date, submit_credential, toggle_calendar,
    toggle_explanation, wait_view_change, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Screen state
        .route("/view", get(get_view))
        .route("/view/changes", get(wait_view_change))
        .route("/view/image", get(get_view_image))
        .route("/view/explanation/toggle", post(toggle_explanation))
        .route("/view/calendar/toggle", post(toggle_calendar))
        // User input
        .route("/date", post(select_date))
        .route("/credential", post(submit_credential))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ApodSource, DownloadConditions, MediaSource, Translator};
    use crate::config::ImageBounds;
    use crate::domain::{ApodRecord, DateKey};
    use crate::errors::{PipelineError, PipelineResult, TranslationError};
    use crate::repo::MemoryCredentialStore;
    use crate::services::media::placeholder;
    use crate::services::{Collaborators, HttpCredentialPrompt, Orchestrator};
    use crate::view::{Display, ViewEvent, ViewState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoApod;

    #[async_trait]
    impl ApodSource for NoApod {
        async fn fetch_metadata(&self, _: &str, _: DateKey) -> PipelineResult<ApodRecord> {
            Err(PipelineError::MetadataFetchFailed("offline".into()))
        }
    }

    struct NoMedia;

    #[async_trait]
    impl MediaSource for NoMedia {
        async fn fetch_bytes(&self, _: &str) -> PipelineResult<Vec<u8>> {
            Err(PipelineError::MediaFetchFailed("offline".into()))
        }
    }

    struct NoTranslator;

    #[async_trait]
    impl Translator for NoTranslator {
        async fn prepare(&self, _: &DownloadConditions) -> Result<(), TranslationError> {
            Ok(())
        }

        async fn translate(&self, _: &str) -> Result<String, TranslationError> {
            Err(TranslationError::ModelNotReady)
        }
    }

    fn app() -> (Router, AppState) {
        let display = Display::new(ViewState::initial(DateKey::today()));
        let prompt = Arc::new(HttpCredentialPrompt::new());
        let orchestrator = Orchestrator::new(
            Collaborators {
                apod: Arc::new(NoApod),
                media: Arc::new(NoMedia),
                translator: Arc::new(NoTranslator),
                store: Arc::new(MemoryCredentialStore::with_value("KEY")),
                prompt: prompt.clone(),
            },
            display,
            ImageBounds::default(),
            false,
        );
        let state = AppState {
            orchestrator,
            prompt,
        };
        (build_router(state.clone()), state)
    }

    async fn json(app: Router, request: Request<Body>) -> Value {
        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let body = json(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_view_is_flattened_with_ok() {
        let (app, _) = app();
        let body = json(app, Request::get("/view").body(Body::empty()).unwrap()).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["phase"], "loading");
        assert_eq!(body["website_url"], "https://apod.nasa.gov/apod/");
    }

    #[tokio::test]
    async fn test_select_date_rejects_out_of_range() {
        let (app, _) = app();
        let body = json(
            app,
            post_json("/date", serde_json::json!({"year": 1990, "month": 1, "day": 1})),
        )
        .await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_select_date_starts_loading() {
        let (app, state) = app();
        state.orchestrator.ensure_credential().await.unwrap();
        state.orchestrator.display().apply(ViewEvent::Loaded);

        let body = json(
            app,
            post_json("/date", serde_json::json!({"year": 2024, "month": 3, "day": 7})),
        )
        .await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["date"], "2024-3-7");
        assert_eq!(
            state.orchestrator.display().snapshot().phase,
            crate::view::Phase::Loading
        );
    }

    #[tokio::test]
    async fn test_select_date_before_credential_conflicts() {
        let (app, state) = app();
        state
            .orchestrator
            .display()
            .apply(ViewEvent::CredentialRequested);

        let body = json(
            app.clone(),
            post_json("/date", serde_json::json!({"year": 2024, "month": 3, "day": 7})),
        )
        .await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let body = json(
            app,
            Request::post("/view/calendar/toggle")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["error"]["code"], "CONFLICT");

        let view = state.orchestrator.display().snapshot();
        assert_eq!(view.phase, crate::view::Phase::AwaitingCredential);
        assert!(!view.calendar_visible);
    }

    #[tokio::test]
    async fn test_credential_without_prompt_conflicts() {
        let (app, _) = app();
        let body = json(
            app,
            post_json("/credential", serde_json::json!({"api_key": "k"})),
        )
        .await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_image_not_found_then_png() {
        let (app, state) = app();
        let body = json(
            app.clone(),
            Request::get("/view/image").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        state
            .orchestrator
            .display()
            .apply(ViewEvent::ImagePlaceholder(Arc::new(placeholder())));
        let response = app
            .oneshot(Request::get("/view/image").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_view_changes_returns_after_update() {
        let (app, state) = app();
        let pending = tokio::spawn(json(
            app,
            Request::get("/view/changes").body(Body::empty()).unwrap(),
        ));
        // give the request time to subscribe before the update
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        state
            .orchestrator
            .display()
            .apply(ViewEvent::CredentialRequested);

        let body = pending.await.unwrap();
        assert_eq!(body["phase"], "awaiting_credential");
    }

    #[tokio::test]
    async fn test_toggles_flip_visibility() {
        let (app, _) = app();
        let body = json(
            app.clone(),
            Request::post("/view/calendar/toggle")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["calendar_visible"], true);

        let body = json(
            app,
            Request::post("/view/explanation/toggle")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["explanation_visible"], true);
    }
}
