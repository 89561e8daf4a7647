use super::{Schema, SchemaKind, SchemaRegistry};
use crate::error::RegistryError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRegistryConfig {
    /// Base URL without a trailing slash
    pub url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Basic-auth username and password
    pub credentials: Option<(String, String)>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchemaRequest<'a> {
    schema: &'a str,
    schema_type: &'a str,
}

#[derive(Deserialize)]
struct IdResponse {
    id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaResponse {
    schema: String,
    #[serde(default)]
    schema_type: Option<String>,
}

/// REST client for a Confluent-compatible schema registry.
pub struct HttpSchemaRegistry {
    client: Client,
    base: Url,
    credentials: Option<(String, String)>,
}

impl HttpSchemaRegistry {
    pub fn new(config: HttpRegistryConfig) -> Result<Self, RegistryError> {
        let base = Url::parse(&config.url)
            .map_err(|e| RegistryError::InvalidUrl(format!("'{}': {e}", config.url)))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            credentials: config.credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn post_schema(&self, url: Url, schema: &Schema) -> Result<Response, RegistryError> {
        let body = SchemaRequest {
            schema: &schema.definition,
            schema_type: schema.kind.as_str(),
        };
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(&body);
        Ok(self.authorize(request).send().await?)
    }
}

async fn status_error(response: Response) -> RegistryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RegistryError::Status { status, body }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32, RegistryError> {
        let url = self.endpoint(&["subjects", subject, "versions"]);
        let response = self.post_schema(url, schema).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let IdResponse { id } = response.json().await?;
        debug!("Registered {} schema under {subject} with id {id}", schema.kind);
        Ok(id)
    }

    async fn lookup(&self, subject: &str, schema: &Schema) -> Result<u32, RegistryError> {
        let url = self.endpoint(&["subjects", subject]);
        let response = self.post_schema(url, schema).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let IdResponse { id } = response.json().await?;
        Ok(id)
    }

    async fn schema_by_id(&self, id: u32) -> Result<Schema, RegistryError> {
        let url = self.endpoint(&["schemas", "ids", &id.to_string()]);
        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::SchemaNotFound(id));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body: SchemaResponse = response.json().await?;
        Ok(Schema {
            kind: SchemaKind::from_registry(body.schema_type.as_deref()),
            definition: body.schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str) -> HttpSchemaRegistry {
        HttpSchemaRegistry::new(HttpRegistryConfig {
            url: url.to_string(),
            request_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            credentials: None,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_paths() {
        let registry = client_for("http://registry:8081");
        assert_eq!(
            registry
                .endpoint(&["subjects", "orders-value", "versions"])
                .as_str(),
            "http://registry:8081/subjects/orders-value/versions"
        );

        let registry = client_for("http://proxy/registry");
        assert_eq!(
            registry.endpoint(&["schemas", "ids", "7"]).as_str(),
            "http://proxy/registry/schemas/ids/7"
        );
    }

    #[test]
    fn test_subject_is_escaped() {
        let registry = client_for("http://registry:8081");
        assert_eq!(
            registry.endpoint(&["subjects", "a/b-value"]).as_str(),
            "http://registry:8081/subjects/a%2Fb-value"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = HttpSchemaRegistry::new(HttpRegistryConfig {
            url: "not a url".to_string(),
            request_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
            credentials: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let body = SchemaRequest {
            schema: "syntax = \"proto3\";",
            schema_type: SchemaKind::Protobuf.as_str(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["schemaType"], "PROTOBUF");
        assert_eq!(json["schema"], "syntax = \"proto3\";");
    }
}
