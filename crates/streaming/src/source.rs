//! Dataset sources for map layers.
//!
//! Every layer's data is a GeoJSON `FeatureCollection` addressed by a dataset
//! id. Sources resolve the id to a payload:
//! - [`HttpDataSource`]: `GET {base_url}/mapData/{id}.geojson`
//! - [`DirectoryDataSource`]: `{root}/mapData/{id}.geojson` on local disk
//! - [`MemoryDataSource`]: preloaded payloads, for tests and demos

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use formats::{FeatureCollection, GeoJsonError};
use tracing::debug;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
pub enum FetchError {
    InvalidDatasetId(String),
    NotFound { dataset_id: String },
    Transport { dataset_id: String, message: String },
    Status { dataset_id: String, status: u16 },
    Parse { dataset_id: String, source: GeoJsonError },
}

impl FetchError {
    pub fn dataset_id(&self) -> &str {
        match self {
            FetchError::InvalidDatasetId(id) => id,
            FetchError::NotFound { dataset_id }
            | FetchError::Transport { dataset_id, .. }
            | FetchError::Status { dataset_id, .. }
            | FetchError::Parse { dataset_id, .. } => dataset_id,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidDatasetId(id) => write!(f, "invalid dataset id: {id:?}"),
            FetchError::NotFound { dataset_id } => write!(f, "dataset {dataset_id} not found"),
            FetchError::Transport {
                dataset_id,
                message,
            } => write!(f, "fetching dataset {dataset_id} failed: {message}"),
            FetchError::Status { dataset_id, status } => {
                write!(f, "dataset {dataset_id} returned HTTP {status}")
            }
            FetchError::Parse { dataset_id, source } => {
                write!(f, "dataset {dataset_id} is not valid GeoJSON: {source}")
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Trait for dataset providers.
///
/// Methods return boxed futures for dyn-compatibility.
pub trait DataSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        dataset_id: &'a str,
    ) -> BoxFuture<'a, Result<FeatureCollection, FetchError>>;
}

/// Dataset ids become path segments; reject anything that could escape.
fn validate_dataset_id(dataset_id: &str) -> Result<(), FetchError> {
    let ok = !dataset_id.is_empty()
        && dataset_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !dataset_id.contains("..");
    if ok {
        Ok(())
    } else {
        Err(FetchError::InvalidDatasetId(dataset_id.to_string()))
    }
}

fn parse_payload(dataset_id: &str, payload: &str) -> Result<FeatureCollection, FetchError> {
    FeatureCollection::from_geojson_str(payload).map_err(|source| FetchError::Parse {
        dataset_id: dataset_id.to_string(),
        source,
    })
}

#[derive(Debug, Clone)]
pub struct HttpDataSource {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub fn url_for(&self, dataset_id: &str) -> String {
        format!(
            "{}/mapData/{dataset_id}.geojson",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl DataSource for HttpDataSource {
    fn fetch<'a>(
        &'a self,
        dataset_id: &'a str,
    ) -> BoxFuture<'a, Result<FeatureCollection, FetchError>> {
        Box::pin(async move {
            validate_dataset_id(dataset_id)?;
            let url = self.url_for(dataset_id);
            debug!("GET {url}");

            let transport = |e: reqwest::Error| FetchError::Transport {
                dataset_id: dataset_id.to_string(),
                message: e.to_string(),
            };
            let resp = self.http.get(&url).send().await.map_err(transport)?;
            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound {
                    dataset_id: dataset_id.to_string(),
                });
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    dataset_id: dataset_id.to_string(),
                    status: status.as_u16(),
                });
            }
            let body = resp.text().await.map_err(transport)?;
            parse_payload(dataset_id, &body)
        })
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryDataSource {
    root: PathBuf,
}

impl DirectoryDataSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, dataset_id: &str) -> PathBuf {
        self.root
            .join("mapData")
            .join(format!("{dataset_id}.geojson"))
    }
}

impl DataSource for DirectoryDataSource {
    fn fetch<'a>(
        &'a self,
        dataset_id: &'a str,
    ) -> BoxFuture<'a, Result<FeatureCollection, FetchError>> {
        Box::pin(async move {
            validate_dataset_id(dataset_id)?;
            let path = self.path_for(dataset_id);
            debug!("reading {}", path.display());
            let payload = match tokio::fs::read_to_string(&path).await {
                Ok(p) => p,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(FetchError::NotFound {
                        dataset_id: dataset_id.to_string(),
                    });
                }
                Err(e) => {
                    return Err(FetchError::Transport {
                        dataset_id: dataset_id.to_string(),
                        message: e.to_string(),
                    });
                }
            };
            parse_payload(dataset_id, &payload)
        })
    }
}

/// In-memory payloads keyed by dataset id. Payloads are parsed on every
/// fetch so malformed entries surface as [`FetchError::Parse`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    payloads: BTreeMap<String, String>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset_id: impl Into<String>, payload: impl Into<String>) {
        self.payloads.insert(dataset_id.into(), payload.into());
    }

    pub fn with(mut self, dataset_id: impl Into<String>, payload: impl Into<String>) -> Self {
        self.insert(dataset_id, payload);
        self
    }
}

impl DataSource for MemoryDataSource {
    fn fetch<'a>(
        &'a self,
        dataset_id: &'a str,
    ) -> BoxFuture<'a, Result<FeatureCollection, FetchError>> {
        Box::pin(async move {
            validate_dataset_id(dataset_id)?;
            let payload = self
                .payloads
                .get(dataset_id)
                .ok_or_else(|| FetchError::NotFound {
                    dataset_id: dataset_id.to_string(),
                })?;
            parse_payload(dataset_id, payload)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSource, DirectoryDataSource, FetchError, HttpDataSource, MemoryDataSource};

    const POINTS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"name":"Taipei Main"},"geometry":{"type":"Point","coordinates":[121.517,25.046]}}
    ]}"#;

    #[test]
    fn http_url_joins_base_without_double_slash() {
        let src = HttpDataSource::new("https://dashboard.example/");
        assert_eq!(
            src.url_for("metro_station"),
            "https://dashboard.example/mapData/metro_station.geojson"
        );
    }

    #[tokio::test]
    async fn directory_source_reads_and_parses() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("mapData")).expect("mkdir");
        std::fs::write(dir.path().join("mapData/metro_station.geojson"), POINTS).expect("write");

        let src = DirectoryDataSource::new(dir.path());
        let fc = src.fetch("metro_station").await.expect("fetch");
        assert_eq!(fc.len(), 1);

        let err = src.fetch("missing").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_path_escaping_ids() {
        let src = MemoryDataSource::new();
        let err = src.fetch("../secrets").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidDatasetId(_)));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_parse_error() {
        let src = MemoryDataSource::new().with("broken", "{\"type\":\"Feature\"}");
        let err = src.fetch("broken").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert_eq!(err.dataset_id(), "broken");
    }
}
