use std::io::Read;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::models::{Collection, Item, ItemScope, Platform, Profile};

/// Body of a ROM download plus its advertised length.
pub struct DownloadStream {
    pub total_bytes: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

/// The four library operations the workers consume, plus the profile.
pub trait LibraryApi: Send + Sync {
    fn host(&self) -> &str;
    fn fetch_platforms(&self) -> Result<Vec<Platform>, ApiError>;
    fn fetch_collections(&self) -> Result<Vec<Collection>, ApiError>;
    fn fetch_items(&self, scope: &ItemScope) -> Result<Vec<Item>, ApiError>;
    fn fetch_profile(&self) -> Result<Profile, ApiError>;
    fn download(&self, item: &Item) -> Result<DownloadStream, ApiError>;
}

pub struct HttpLibrary {
    client: Client,
    host: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsPayload {
    Page { items: Vec<Item> },
    List(Vec<Item>),
}

impl HttpLibrary {
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("romdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::HostUnreachable { host: config.host.clone(), message: e.to_string() })?;
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.host).map_err(|e| self.unreachable(e))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::HostUnreachable { host: self.host.clone(), message: "invalid base url".into() })?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn request(&self, url: Url) -> RequestBuilder {
        let request = self.client.get(url);
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, Some(&self.password))
        }
    }

    fn send(&self, url: Url) -> Result<Response, ApiError> {
        debug!(%url, "GET");
        let response = self.request(url.clone()).send().map_err(|e| self.unreachable(e))?;
        classify_status(response.status(), url.as_str())?;
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let shown = url.to_string();
        let body = self.send(url)?.text().map_err(|e| self.unreachable(e))?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode { url: shown, message: e.to_string() })
    }

    fn unreachable(&self, err: impl std::fmt::Display) -> ApiError {
        ApiError::HostUnreachable { host: self.host.clone(), message: err.to_string() }
    }
}

pub(crate) fn classify_status(status: StatusCode, url: &str) -> Result<(), ApiError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::PermissionDenied),
        s if s.is_success() => Ok(()),
        s => Err(ApiError::Status { status: s.as_u16(), url: url.to_string() }),
    }
}

impl LibraryApi for HttpLibrary {
    fn host(&self) -> &str {
        &self.host
    }

    fn fetch_platforms(&self) -> Result<Vec<Platform>, ApiError> {
        let mut platforms: Vec<Platform> = self.get_json(self.endpoint(&["api", "platforms"], &[])?)?;
        platforms.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        Ok(platforms)
    }

    fn fetch_collections(&self) -> Result<Vec<Collection>, ApiError> {
        let mut collections: Vec<Collection> = self.get_json(self.endpoint(&["api", "collections"], &[])?)?;

        let virtual_url = self.endpoint(&["api", "collections", "virtual"], &[("type", "collection".to_string())])?;
        match self.get_json::<Vec<Collection>>(virtual_url) {
            Ok(virtuals) => collections.extend(virtuals.into_iter().map(|c| Collection { is_virtual: true, ..c })),
            // Servers without virtual collections answer 404.
            Err(ApiError::Status { status: 404, .. }) => debug!("server has no virtual collections"),
            Err(e) => return Err(e),
        }
        Ok(collections)
    }

    fn fetch_items(&self, scope: &ItemScope) -> Result<Vec<Item>, ApiError> {
        let (key, value) = match scope {
            ItemScope::Platform(id) => ("platform_id", id.to_string()),
            ItemScope::Collection(id) => ("collection_id", id.clone()),
            ItemScope::VirtualCollection(id) => ("virtual_collection_id", id.clone()),
        };
        let params = [
            (key, value),
            ("order_by", "name".to_string()),
            ("order_dir", "asc".to_string()),
            ("limit", "10000".to_string()),
        ];
        let payload: ItemsPayload = self.get_json(self.endpoint(&["api", "roms"], &params)?)?;
        Ok(match payload {
            ItemsPayload::Page { items } => items,
            ItemsPayload::List(items) => items,
        })
    }

    fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.get_json(self.endpoint(&["api", "users", "me"], &[])?)
    }

    fn download(&self, item: &Item) -> Result<DownloadStream, ApiError> {
        let id = item.id.to_string();
        let url = self.endpoint(&["api", "roms", &id, "content", &item.fs_name], &[])?;
        let response = self.send(url)?;
        Ok(DownloadStream { total_bytes: response.content_length(), reader: Box::new(response) })
    }
}
