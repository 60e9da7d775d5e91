use reqwest::{StatusCode, Url};
use tracing::debug;

use super::{DocumentSink, IndexDocument, IndexTarget, WriteError};
use crate::utils::rest::{body_head, is_json};
use crate::{AppError, AppResult};

/// Elasticsearch-style document API: `PUT /{index}/{type}/{id}`.
#[derive(Debug, Clone)]
pub struct ElasticSink {
    client: reqwest::Client,
    base_url: Url,
}

impl ElasticSink {
    pub fn new(client: reqwest::Client, base_url: &str) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidValue(format!("sink url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::InvalidValue(format!("sink url {}", base_url)));
        }
        Ok(Self { client, base_url })
    }

    fn document_url(&self, target: &IndexTarget, id: &str) -> Url {
        let mut url = self.base_url.clone();
        // checked in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([target.index.as_str(), target.doc_type.as_str(), id]);
        }
        url
    }
}

impl DocumentSink for ElasticSink {
    async fn write(
        &self,
        target: &IndexTarget,
        id: &str,
        document: &IndexDocument<'_>,
    ) -> Result<(), WriteError> {
        let url = self.document_url(target, id);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(url.clone())
            .json(document)
            .send()
            .await
            .map_err(|e| WriteError::Permanent {
                status: None,
                reason: format!("PUT {}: {}", url, e),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(WriteError::RateLimited);
        }

        let json = is_json(&response);
        let detail = match response.bytes().await {
            Ok(body) if json => serde_json::from_slice::<serde_json::Value>(&body)
                .map(|error_body| error_body.to_string())
                .unwrap_or_else(|_| body_head(&body)),
            Ok(body) => body_head(&body),
            Err(e) => format!("read error: {}", e),
        };
        Err(WriteError::Permanent {
            status: Some(status.as_u16()),
            reason: format!("{} from {}: {}", status, url, detail),
        })
    }
}
