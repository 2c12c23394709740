//! HTTP adapter for the hosted document store.
//!
//! Writes go through the mutation endpoint as a single `create` mutation;
//! reads go through the query endpoint with a fixed projection. Both are
//! authenticated with a bearer token held by the server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::stores::{ContentStore, CreatedPost, StoreError};
use crate::domain::posts::{PostDraft, PostRecord};

use super::error::InfraError;

const DOCUMENT_TYPE: &str = "post";
const POSTS_QUERY: &str =
    "*[_type == 'post']{publishedAt, title, body, categories, mainImage, author, _id}";

pub struct HttpContentStore {
    client: Client,
    mutate_url: Url,
    query_url: Url,
    token: String,
}

impl HttpContentStore {
    pub fn new(
        base_url: &Url,
        api_version: &str,
        dataset: &str,
        token: impl Into<String>,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build HTTP client: {err}"))
            })?;

        let mutate_url = join_endpoint(base_url, api_version, "mutate", dataset)?;
        let query_url = join_endpoint(base_url, api_version, "query", dataset)?;

        Ok(Self {
            client,
            mutate_url,
            query_url,
            token: token.into(),
        })
    }
}

pub(crate) fn user_agent() -> &'static str {
    concat!("scrawl/", env!("CARGO_PKG_VERSION"))
}

fn join_endpoint(
    base_url: &Url,
    api_version: &str,
    operation: &str,
    dataset: &str,
) -> Result<Url, InfraError> {
    base_url
        .join(&format!("{api_version}/data/{operation}/{dataset}"))
        .map_err(|err| InfraError::configuration(format!("invalid content store URL: {err}")))
}

#[derive(Serialize)]
struct MutationRequest<'a> {
    mutations: [Mutation<'a>; 1],
}

#[derive(Serialize)]
struct Mutation<'a> {
    create: CreateDocument<'a>,
}

#[derive(Serialize)]
struct CreateDocument<'a> {
    #[serde(rename = "_type")]
    doc_type: &'static str,
    #[serde(flatten)]
    draft: &'a PostDraft,
}

#[derive(Deserialize)]
struct MutationResponse {
    #[serde(default)]
    results: Vec<MutationResult>,
}

#[derive(Deserialize)]
struct MutationResult {
    id: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Vec<PostRecord>,
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost, StoreError> {
        let body = MutationRequest {
            mutations: [Mutation {
                create: CreateDocument {
                    doc_type: DOCUMENT_TYPE,
                    draft,
                },
            }],
        };

        let response = self
            .client
            .post(self.mutate_url.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|err| StoreError::transport(err.to_string()))
            .inspect_err(note_failure)?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| StoreError::transport(err.to_string()))
            .inspect_err(note_failure)?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes).into_owned();
            let err = StoreError::upstream_status(status.as_u16(), detail);
            note_failure(&err);
            return Err(err);
        }

        let parsed: MutationResponse = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::malformed(format!("mutation response: {err}")))
            .inspect_err(note_failure)?;

        Ok(CreatedPost {
            id: parsed.results.into_iter().next().and_then(|r| r.id),
        })
    }

    async fn list_posts(&self) -> Result<Vec<PostRecord>, StoreError> {
        let mut url = self.query_url.clone();
        url.query_pairs_mut().append_pair("query", POSTS_QUERY);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| StoreError::transport(err.to_string()))
            .inspect_err(note_failure)?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| StoreError::transport(err.to_string()))
            .inspect_err(note_failure)?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes).into_owned();
            let err = StoreError::upstream_status(status.as_u16(), detail);
            note_failure(&err);
            return Err(err);
        }

        let parsed: QueryResponse = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::malformed(format!("query response: {err}")))
            .inspect_err(note_failure)?;

        Ok(parsed.result)
    }
}

fn note_failure(_err: &StoreError) {
    metrics::counter!("scrawl_store_failures_total").increment(1);
}
