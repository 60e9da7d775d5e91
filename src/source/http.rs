use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{FetchError, LogSource};
use crate::message::{Batch, Message, Offset, PartitionInfo, TopicPartition};
use crate::utils::rest::{body_head, content_type, is_json};
use crate::{AppError, AppResult};

/// Every proxy response wraps its payload in `{"Data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Data")]
    data: T,
}

#[derive(Debug, Deserialize)]
struct MessagesData {
    #[serde(rename = "Messages", default)]
    messages: Option<Vec<Message>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OutOfRange {
    offset_from: Offset,
    offset_to: Offset,
}

/// Client of the kafka-http proxy `v1` API.
#[derive(Debug, Clone)]
pub struct HttpLogSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLogSource {
    /// `proxy_url` is the proxy root; the API version is appended here.
    pub fn new(client: reqwest::Client, proxy_url: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/v1", proxy_url.trim_end_matches('/')),
        }
    }

    /// Rejects anything that is not JSON before the status is looked at, so a
    /// misbehaving gateway in front of the proxy never gets decoded.
    async fn check_json(url: &str, response: Response) -> Result<Response, String> {
        if is_json(&response) {
            return Ok(response);
        }
        let status = response.status();
        let content_type = content_type(&response);
        let head = match response.bytes().await {
            Ok(body) => body_head(&body),
            Err(e) => return Err(format!("{} from {}: read error: {}", status, url, e)),
        };
        Err(format!(
            "{} from {}: got response with content-type {}: {}",
            status, url, content_type, head
        ))
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, String> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("{} from {}: read error: {}", status, url, e))?;
        serde_json::from_slice(&body)
            .map_err(|e| format!("{} from {}: parse response: {}", status, url, e))
    }
}

impl LogSource for HttpLogSource {
    async fn list_partitions(&self, topic: &str) -> AppResult<Vec<PartitionInfo>> {
        let url = format!("{}/info/topics/{}", self.base_url, topic);
        let discovery_error = |reason: String| AppError::PartitionDiscovery {
            topic: topic.to_string(),
            reason,
        };
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| discovery_error(e.to_string()))?;
        let response = Self::check_json(&url, response)
            .await
            .map_err(discovery_error)?;
        if response.status() != StatusCode::OK {
            return Err(discovery_error(format!("{} from {}", response.status(), url)));
        }

        let envelope: Envelope<Vec<PartitionInfo>> = Self::decode(&url, response)
            .await
            .map_err(discovery_error)?;
        Ok(envelope.data)
    }

    async fn fetch_batch(
        &self,
        topic_partition: &TopicPartition,
        offset: Offset,
        limit: i64,
    ) -> Result<Batch, FetchError> {
        let url = format!(
            "{}/topics/{}/{}",
            self.base_url, topic_partition.topic, topic_partition.partition
        );
        debug!("GET {} offset={} limit={}", url, offset, limit);

        let response = self
            .client
            .get(&url)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        let response = Self::check_json(&url, response)
            .await
            .map_err(FetchError::Transient)?;

        match response.status() {
            StatusCode::OK => {
                let envelope: Envelope<MessagesData> = Self::decode(&url, response)
                    .await
                    .map_err(FetchError::Transient)?;
                Ok(envelope.data.messages.unwrap_or_default())
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let envelope: Envelope<OutOfRange> = Self::decode(&url, response)
                    .await
                    .map_err(FetchError::Transient)?;
                Err(FetchError::RangeInvalid {
                    offset_from: envelope.data.offset_from,
                    offset_to: envelope.data.offset_to,
                })
            }
            status => Err(FetchError::Transient(format!("{} from {}", status, url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::{Path, Query};
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    /// Partition 0 of "events" holds offsets [10, 13).
    const FIRST: i64 = 10;
    const END: i64 = 13;

    async fn topic_info(Path(topic): Path<String>) -> AxumResponse {
        if topic != "events" {
            return (
                AxumStatus::NOT_FOUND,
                Json(json!({"Error": "unknown topic"})),
            )
                .into_response();
        }
        Json(json!({"Data": [
            {"Topic": "events", "Partition": 0, "OffsetFrom": FIRST, "OffsetTo": END},
            {"Topic": "events", "Partition": 1, "OffsetFrom": 0, "OffsetTo": 0},
        ]}))
        .into_response()
    }

    async fn topic_messages(
        Path((topic, partition)): Path<(String, i32)>,
        Query(params): Query<HashMap<String, i64>>,
    ) -> AxumResponse {
        match topic.as_str() {
            "broken" => {
                return (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({"Error": "boom"})))
                    .into_response()
            }
            "gateway" => {
                return (
                    AxumStatus::BAD_GATEWAY,
                    [(header::CONTENT_TYPE, "text/html")],
                    "<html>bad gateway</html>",
                )
                    .into_response()
            }
            "garbled" => {
                return (
                    [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
                    "{\"Data\": ",
                )
                    .into_response()
            }
            _ => {}
        }
        if partition == 1 {
            return Json(json!({"Data": {"Messages": null}})).into_response();
        }

        let offset = params["offset"];
        let limit = params["limit"];
        if offset < FIRST || offset >= END {
            return (
                AxumStatus::RANGE_NOT_SATISFIABLE,
                Json(json!({"Data": {"OffsetFrom": FIRST, "OffsetTo": END}})),
            )
                .into_response();
        }
        let messages: Vec<_> = (offset..END.min(offset + limit))
            .map(|o| {
                json!({
                    "ID": format!("m-{}", o),
                    "Accepted": 1_700_000_000_000_000_000i64 + o,
                    "Sender": {"host": "a"},
                    "Data": {"n": o},
                })
            })
            .collect();
        Json(json!({"Data": {"Messages": messages}})).into_response()
    }

    async fn start_proxy() -> String {
        let app = Router::new()
            .route("/v1/info/topics/{topic}", get(topic_info))
            .route("/v1/topics/{topic}/{partition}", get(topic_messages));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_list_partitions() {
        let source = HttpLogSource::new(reqwest::Client::new(), &start_proxy().await);

        let partitions = source.list_partitions("events").await.unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].topic_partition(), TopicPartition::new("events", 0));
        assert_eq!((partitions[0].offset_from, partitions[0].offset_to), (FIRST, END));

        let result = source.list_partitions("missing").await;
        assert!(matches!(
            result,
            Err(AppError::PartitionDiscovery { topic, .. }) if topic == "missing"
        ));
    }

    #[tokio::test]
    async fn test_fetch_batch_in_range() {
        let source = HttpLogSource::new(reqwest::Client::new(), &start_proxy().await);
        let tp = TopicPartition::new("events", 0);

        let batch = source.fetch_batch(&tp, 11, 100).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m-11", "m-12"]);
        assert_eq!(batch[0].data.get(), r#"{"n":11}"#);

        let batch = source.fetch_batch(&tp, 10, 1).await.unwrap();
        assert_eq!(batch.len(), 1);

        let empty = source
            .fetch_batch(&TopicPartition::new("events", 1), 0, 100)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_batch_out_of_range() {
        let source = HttpLogSource::new(reqwest::Client::new(), &start_proxy().await);
        let tp = TopicPartition::new("events", 0);

        for offset in [0, 9, 13, 500] {
            let result = source.fetch_batch(&tp, offset, 100).await;
            assert_eq!(
                result.unwrap_err(),
                FetchError::RangeInvalid {
                    offset_from: FIRST,
                    offset_to: END
                }
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_batch_transient_failures() {
        let source = HttpLogSource::new(reqwest::Client::new(), &start_proxy().await);

        let result = source
            .fetch_batch(&TopicPartition::new("broken", 0), 0, 10)
            .await;
        assert!(matches!(result, Err(FetchError::Transient(reason)) if reason.contains("500")));

        let result = source
            .fetch_batch(&TopicPartition::new("gateway", 0), 0, 10)
            .await;
        assert!(matches!(
            result,
            Err(FetchError::Transient(reason)) if reason.contains("text/html") && reason.contains("bad gateway")
        ));

        let result = source
            .fetch_batch(&TopicPartition::new("garbled", 0), 0, 10)
            .await;
        assert!(matches!(result, Err(FetchError::Transient(reason)) if reason.contains("parse response")));
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpLogSource::new(reqwest::Client::new(), &format!("http://{}", addr));
        let result = source
            .fetch_batch(&TopicPartition::new("events", 0), 0, 10)
            .await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }
}
