/// External API clients module
use crate::domain::{ApodRecord, DateKey};
use crate::errors::{PipelineError, PipelineResult, TranslationError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

pub const SOURCE_LANGUAGE: &str = "en";
pub const TARGET_LANGUAGE: &str = "es";

/// HTTP client wrapper with common configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("apod-screen/0.1")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Source of APOD metadata.
#[async_trait]
pub trait ApodSource: Send + Sync {
    async fn fetch_metadata(&self, api_key: &str, date: DateKey) -> PipelineResult<ApodRecord>;
}

/// Source of raw media bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> PipelineResult<Vec<u8>>;
}

/// Gate for the one-time translation model preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConditions {
    pub require_unmetered: bool,
}

/// English to Spanish translation collaborator.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Make the model usable. Called once, before or alongside the first load.
    async fn prepare(&self, conditions: &DownloadConditions) -> Result<(), TranslationError>;

    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

/// NASA APOD metadata client
pub struct ApodClient {
    http_client: HttpClient,
    base_url: String,
}

impl ApodClient {
    pub fn new(http_client: HttpClient, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    /// Request URL for one day. The key and date are concatenated as-is; the
    /// upstream parser expects the unpadded `y-m-d` form.
    pub fn request_url(&self, api_key: &str, date: DateKey) -> String {
        format!("{}?api_key={}&date={}", self.base_url, api_key, date)
    }
}

#[async_trait]
impl ApodSource for ApodClient {
    async fn fetch_metadata(&self, api_key: &str, date: DateKey) -> PipelineResult<ApodRecord> {
        debug!(%date, "requesting APOD metadata");
        let url = self.request_url(api_key, date);
        let fail = |e: reqwest::Error| PipelineError::MetadataFetchFailed(e.to_string());

        let body = self
            .http_client
            .get_client()
            .get(&url)
            .send()
            .await
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?
            .text()
            .await
            .map_err(fail)?;

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| PipelineError::MetadataFetchFailed(format!("invalid JSON: {e}")))?;

        Ok(ApodRecord::from_json(&json))
    }
}

/// Binary media client
pub struct MediaClient {
    http_client: HttpClient,
}

impl MediaClient {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl MediaSource for MediaClient {
    async fn fetch_bytes(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let fail = |e: reqwest::Error| PipelineError::MediaFetchFailed(e.to_string());

        let bytes = self
            .http_client
            .get_client()
            .get(url)
            .send()
            .await
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?
            .bytes()
            .await
            .map_err(fail)?;

        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    code: String,
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

/// LibreTranslate-compatible translation client
pub struct TranslateClient {
    http_client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    metered: bool,
    ready: AtomicBool,
}

impl TranslateClient {
    pub fn new(
        http_client: HttpClient,
        base_url: String,
        api_key: Option<String>,
        metered: bool,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            metered,
            ready: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for TranslateClient {
    async fn prepare(&self, conditions: &DownloadConditions) -> Result<(), TranslationError> {
        if self.is_ready() {
            return Ok(());
        }
        if conditions.require_unmetered && self.metered {
            return Err(TranslationError::DownloadDeferred(
                "network is metered".to_string(),
            ));
        }

        let languages: Vec<LanguageEntry> = self
            .http_client
            .get_client()
            .get(format!("{}/languages", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let offered = languages.iter().any(|lang| {
            lang.code == SOURCE_LANGUAGE && lang.targets.iter().any(|t| t == TARGET_LANGUAGE)
        });
        if !offered {
            return Err(TranslationError::UnsupportedPair {
                from: SOURCE_LANGUAGE.to_string(),
                to: TARGET_LANGUAGE.to_string(),
            });
        }

        self.ready.store(true, Ordering::SeqCst);
        info!("translation model {SOURCE_LANGUAGE}->{TARGET_LANGUAGE} ready");
        Ok(())
    }

    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        if !self.is_ready() {
            return Err(TranslationError::ModelNotReady);
        }
        if text.is_empty() {
            return Ok(String::new());
        }

        let request = TranslateRequest {
            q: text,
            source: SOURCE_LANGUAGE,
            target: TARGET_LANGUAGE,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response: TranslateResponse = self
            .http_client
            .get_client()
            .post(format!("{}/translate", self.base_url))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        match (response.translated_text, response.error) {
            (Some(translated), _) => Ok(translated),
            (None, Some(error)) => Err(TranslationError::Request(error)),
            (None, None) => Err(TranslationError::Request(
                "response carried no translatedText".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{RawQuery, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn http() -> HttpClient {
        HttpClient::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_url_concatenates_unpadded_date() {
        let client = ApodClient::new(http(), "https://api.nasa.gov/planetary/apod".into());
        let date = DateKey {
            year: 2024,
            month: 3,
            day: 7,
        };
        assert_eq!(
            client.request_url("DEMO_KEY", date),
            "https://api.nasa.gov/planetary/apod?api_key=DEMO_KEY&date=2024-3-7"
        );
    }

    #[test]
    fn test_request_url_keeps_blank_key() {
        let client = ApodClient::new(http(), "http://x/apod".into());
        let date = DateKey {
            year: 1995,
            month: 6,
            day: 16,
        };
        assert_eq!(client.request_url("", date), "http://x/apod?api_key=&date=1995-6-16");
    }

    #[tokio::test]
    async fn test_fetch_metadata_sends_query_and_parses_record() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let app = Router::new()
            .route(
                "/apod",
                get(
                    |State(seen): State<Arc<Mutex<Vec<String>>>>, RawQuery(q): RawQuery| async move {
                        seen.lock().unwrap().push(q.unwrap_or_default());
                        Json(serde_json::json!({
                            "title": "Comet",
                            "media_type": "video",
                            "url": "https://youtube.example/embed/x"
                        }))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = serve(app).await;

        let client = ApodClient::new(http(), format!("{base}/apod"));
        let date = DateKey {
            year: 2020,
            month: 1,
            day: 2,
        };
        let record = client.fetch_metadata("KEY", date).await.unwrap();

        assert_eq!(record.title, "Comet");
        assert_eq!(record.media_type, crate::domain::MediaType::Video);
        assert_eq!(record.explanation, "");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["api_key=KEY&date=2020-1-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_metadata_rejected_key_fails() {
        let app = Router::new().route(
            "/apod",
            get(|| async { (StatusCode::FORBIDDEN, "API_KEY_INVALID") }),
        );
        let base = serve(app).await;

        let client = ApodClient::new(http(), format!("{base}/apod"));
        let err = client
            .fetch_metadata("bad", DateKey::first())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MetadataFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_fetch_metadata_non_json_body_fails() {
        let app = Router::new().route("/apod", get(|| async { "<html>" }));
        let base = serve(app).await;

        let client = ApodClient::new(http(), format!("{base}/apod"));
        let err = client
            .fetch_metadata("k", DateKey::first())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MetadataFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_media_client_fetches_bytes() {
        let app = Router::new().route("/img.png", get(|| async { vec![1u8, 2, 3] }));
        let base = serve(app).await;

        let bytes = MediaClient::new(http())
            .fetch_bytes(&format!("{base}/img.png"))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_media_client_not_found_fails() {
        let app = Router::new();
        let base = serve(app).await;

        let err = MediaClient::new(http())
            .fetch_bytes(&format!("{base}/missing.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MediaFetchFailed(_)));
    }

    fn languages() -> Router {
        Router::new().route(
            "/languages",
            get(|| async {
                Json(serde_json::json!([
                    {"code": "en", "name": "English", "targets": ["es", "fr"]},
                    {"code": "es", "name": "Spanish", "targets": ["en"]}
                ]))
            }),
        )
    }

    fn libre_translate() -> Router {
        languages().route(
            "/translate",
            post(|Json(body): Json<Value>| async move {
                let q = body["q"].as_str().unwrap_or_default();
                assert_eq!(body["source"], "en");
                assert_eq!(body["target"], "es");
                Json(serde_json::json!({ "translatedText": format!("es:{q}") }))
            }),
        )
    }

    #[tokio::test]
    async fn test_translate_requires_prepare() {
        let base = serve(libre_translate()).await;
        let client = TranslateClient::new(http(), base, None, false);

        assert_eq!(
            client.translate("hello").await,
            Err(TranslationError::ModelNotReady)
        );

        let conditions = DownloadConditions {
            require_unmetered: true,
        };
        client.prepare(&conditions).await.unwrap();
        assert!(client.is_ready());
        assert_eq!(client.translate("hello").await.unwrap(), "es:hello");
    }

    #[tokio::test]
    async fn test_prepare_deferred_on_metered_network() {
        let base = serve(libre_translate()).await;
        let client = TranslateClient::new(http(), base, None, true);

        let err = client
            .prepare(&DownloadConditions {
                require_unmetered: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranslationError::DownloadDeferred(_)));
        assert!(!client.is_ready());

        client
            .prepare(&DownloadConditions {
                require_unmetered: false,
            })
            .await
            .unwrap();
        assert!(client.is_ready());
    }

    #[tokio::test]
    async fn test_prepare_fails_without_pair() {
        let app = Router::new().route(
            "/languages",
            get(|| async { Json(serde_json::json!([{"code": "en", "targets": ["fr"]}])) }),
        );
        let base = serve(app).await;
        let client = TranslateClient::new(http(), base, None, false);

        let err = client
            .prepare(&DownloadConditions {
                require_unmetered: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranslationError::UnsupportedPair { .. }));
    }

    #[tokio::test]
    async fn test_translate_surfaces_service_error() {
        let app = languages().route(
            "/translate",
            post(|| async { Json(serde_json::json!({"error": "quota exceeded"})) }),
        );
        let base = serve(app).await;
        let client = TranslateClient::new(http(), base, Some("k".into()), false);
        client
            .prepare(&DownloadConditions {
                require_unmetered: false,
            })
            .await
            .unwrap();

        assert_eq!(
            client.translate("hi").await,
            Err(TranslationError::Request("quota exceeded".into()))
        );
    }
}
