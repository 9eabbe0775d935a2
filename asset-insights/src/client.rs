//! Transport seam and HTTP implementation
//!
//! The core hands a transport two clause buckets: unbreakable filters go into
//! every request, breakable OR-groups may be split across requests when the
//! combined query string would blow the URL length budget. The transport
//! unions the pages of every issued query; identifier-based de-duplication of
//! the union happens in the facade, which owns the schema.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;

/// Ceiling for the encoded `$filter` expression of one request
pub const QUERY_LENGTH_BUDGET: usize = 2000;

const PAGE_SIZE: i64 = 1000;

/// Blocking-free boundary to the remote service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read all raw records matching the compiled clause sets, issuing as
    /// many requests as the breakable groups require
    async fn fetch(
        &self,
        endpoint_url: &str,
        unbreakable: &[String],
        breakable: &[Vec<String>],
    ) -> Result<Vec<serde_json::Map<String, Value>>>;

    /// Issue one request and return the raw response body
    async fn issue_request(
        &self,
        method: &str,
        url: &str,
        json: Option<&Value>,
        params: &[(String, String)],
    ) -> Result<String>;

    fn read_base_url(&self) -> &str;

    fn write_base_url(&self) -> &str;
}

/// Combine clause buckets into concrete `$filter` expressions
///
/// Every query carries all unbreakable clauses AND-ed together. Each breakable
/// group is OR-joined and parenthesized; groups whose encoded length exceeds
/// their share of `budget` are split into chunks, and the queries form the
/// cartesian product of the chunks so the union of all responses equals the
/// logical AND-of-ORs. Deterministic, input-ordered.
pub fn compose_queries(
    unbreakable: &[String],
    breakable: &[Vec<String>],
    budget: usize,
) -> Vec<String> {
    let base = unbreakable.join(" and ");
    let groups: Vec<&Vec<String>> = breakable.iter().filter(|g| !g.is_empty()).collect();
    if groups.is_empty() {
        return vec![base];
    }

    let base_len = encoded_len(&base);
    let share = budget.saturating_sub(base_len).max(1) / groups.len();

    let mut chunked: Vec<Vec<String>> = Vec::new();
    for group in groups {
        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;
        for clause in group {
            // 4 covers the encoded " or " separator
            let clause_len = encoded_len(clause) + 4;
            if !current.is_empty() && current_len + clause_len > share {
                chunks.push(format!("({})", current.join(" or ")));
                current.clear();
                current_len = 0;
            }
            current.push(clause);
            current_len += clause_len;
        }
        if !current.is_empty() {
            chunks.push(format!("({})", current.join(" or ")));
        }
        chunked.push(chunks);
    }

    let mut queries = vec![base];
    for chunks in &chunked {
        let mut next = Vec::with_capacity(queries.len() * chunks.len());
        for query in &queries {
            for chunk in chunks {
                if query.is_empty() {
                    next.push(chunk.clone());
                } else {
                    next.push(format!("{} and {}", query, chunk));
                }
            }
        }
        queries = next;
    }
    queries
}

fn encoded_len(clause: &str) -> usize {
    urlencoding::encode(clause).len()
}

/// Unwrap the service's `{"d": {"results": [...]}}` response envelope
pub fn unwrap_odata_results(body: &Value) -> Result<Vec<serde_json::Map<String, Value>>> {
    let inner = body
        .get("d")
        .context("response envelope is missing the 'd' member")?;
    let results = match inner {
        Value::Array(items) => items,
        Value::Object(wrapper) => wrapper
            .get("results")
            .and_then(Value::as_array)
            .context("response envelope is missing 'd.results'")?,
        _ => bail!("unexpected response envelope shape"),
    };
    results
        .iter()
        .map(|item| {
            item.as_object()
                .cloned()
                .context("response record is not an object")
        })
        .collect()
}

/// Advance the `$top`/`$skip` window after a page of `fetched` records
pub fn next_page_window(top: Option<i64>, skip: i64, fetched: usize) -> (i64, Option<i64>) {
    (skip + fetched as i64, top.map(|t| t - fetched as i64))
}

/// reqwest-backed transport with bearer-token auth
pub struct HttpTransport {
    http: reqwest::Client,
    config: Config,
}

impl HttpTransport {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Config::from_env()?))
    }

    async fn fetch_query(
        &self,
        endpoint_url: &str,
        filter: &str,
    ) -> Result<Vec<serde_json::Map<String, Value>>> {
        let mut results = Vec::new();
        let mut skip: i64 = 0;
        loop {
            let mut params = vec![
                ("$format".to_string(), "json".to_string()),
                ("$top".to_string(), PAGE_SIZE.to_string()),
                ("$skip".to_string(), skip.to_string()),
            ];
            if !filter.is_empty() {
                params.push(("$filter".to_string(), filter.to_string()));
            }
            let body = self.issue_request("GET", endpoint_url, None, &params).await?;
            let parsed: Value = serde_json::from_str(&body)
                .with_context(|| format!("response from {} is not JSON", endpoint_url))?;
            let batch = unwrap_odata_results(&parsed)?;
            let fetched = batch.len();
            results.extend(batch);
            (skip, _) = next_page_window(None, skip, fetched);
            if (fetched as i64) < PAGE_SIZE {
                break;
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        endpoint_url: &str,
        unbreakable: &[String],
        breakable: &[Vec<String>],
    ) -> Result<Vec<serde_json::Map<String, Value>>> {
        let queries = compose_queries(unbreakable, breakable, QUERY_LENGTH_BUDGET);
        log::debug!("fetching {} with {} query variant(s)", endpoint_url, queries.len());
        let batches = futures::future::try_join_all(
            queries
                .iter()
                .map(|query| self.fetch_query(endpoint_url, query)),
        )
        .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn issue_request(
        &self,
        method: &str,
        url: &str,
        json: Option<&Value>,
        params: &[(String, String)],
    ) -> Result<String> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .with_context(|| format!("invalid HTTP method '{}'", method))?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&self.config.token);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(json) = json {
            request = request.json(json);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading response body from {} failed", url))?;
        if !status.is_success() {
            bail!("{} {} returned {}: {}", method, url, status, body);
        }
        Ok(body)
    }

    fn read_base_url(&self) -> &str {
        &self.config.read_base_url
    }

    fn write_base_url(&self) -> &str {
        &self.config.write_base_url
    }
}
