//! HTTP clients for the hosted table API and object storage.
//!
//! The table API follows PostgREST conventions: filters are query
//! parameters of the form `column=op.value`, disjunctions are
//! `or=(a.op.v,b.op.v)` and joins are spelled inside `select`.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{
    format_number, validate_identifier, BlobError, BlobResult, BlobStore, Predicate, Record,
    Relation, RemoteQueryError, StoreResult, TableQuery, TableStore, UploadOptions,
};
use crate::config::ClinicConfig;

/// Build the shared HTTP client. Timeouts come from configuration only.
pub fn build_http_client(config: &ClinicConfig) -> reqwest::Result<Client> {
    Client::builder().timeout(config.http_timeout).build()
}

fn service_url(api_url: &str, service: &str) -> Result<Url, url::ParseError> {
    let base = format!("{}/", api_url.trim_end_matches('/'));
    Url::parse(&base)?.join(service)
}

/// [`TableStore`] over the hosted REST API.
pub struct RestTableStore {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestTableStore {
    pub fn new(config: &ClinicConfig) -> StoreResult<Self> {
        Self::with_client(build_http_client(config)?, config)
    }

    pub fn with_client(client: Client, config: &ClinicConfig) -> StoreResult<Self> {
        Ok(Self {
            client,
            base: service_url(&config.api_url, "rest/v1/")?,
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> StoreResult<Url> {
        Ok(self.base.join(validate_identifier(table)?)?)
    }

    fn row_url(&self, table: &str, id: &str) -> StoreResult<Url> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }

    /// Render a read request as a URL.
    pub fn query_url(&self, query: &TableQuery) -> StoreResult<Url> {
        let mut url = self.table_url(&query.table)?;
        let select = select_clause(query)?;
        let filters = query
            .filters
            .iter()
            .map(filter_param)
            .collect::<StoreResult<Vec<_>>>()?;
        let order = match &query.order {
            Some(order) => Some(format!(
                "{}.{}",
                validate_identifier(&order.column)?,
                if order.ascending { "asc" } else { "desc" }
            )),
            None => None,
        };

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &select);
            for (key, value) in &filters {
                pairs.append_pair(key, value);
            }
            if let Some(order) = &order {
                pairs.append_pair("order", order);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
    }

    async fn rows(response: Response) -> StoreResult<Vec<Record>> {
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Record>>().await?)
    }
}

#[async_trait]
impl TableStore for RestTableStore {
    async fn query(&self, query: &TableQuery) -> StoreResult<Vec<Record>> {
        let url = self.query_url(query)?;
        debug!(%url, "table store query");
        let response = self.request(Method::GET, url).send().await?;
        Self::rows(response).await
    }

    async fn insert(&self, table: &str, fields: Record) -> StoreResult<Record> {
        let url = self.table_url(table)?;
        let response = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;
        Self::rows(response).await?.into_iter().next().ok_or_else(|| {
            RemoteQueryError::UnexpectedResponse(format!("insert into {table} returned no row"))
        })
    }

    async fn update(&self, table: &str, id: &str, fields: Record) -> StoreResult<Record> {
        let url = self.row_url(table, id)?;
        let response = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteQueryError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        let url = self.row_url(table, id)?;
        let response = self.request(Method::DELETE, url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), %body, "table store request failed");
    Err(RemoteQueryError::Status {
        status: status.as_u16(),
        body,
    })
}

fn select_clause(query: &TableQuery) -> StoreResult<String> {
    let mut parts = if query.columns.is_empty() {
        vec!["*".to_string()]
    } else {
        query
            .columns
            .iter()
            .map(|c| validate_identifier(c).map(str::to_string))
            .collect::<StoreResult<Vec<_>>>()?
    };
    for join in &query.joins {
        let table = validate_identifier(&join.table)?;
        match &join.relation {
            Relation::BelongsTo { foreign_key } | Relation::HasMany { foreign_key } => {
                validate_identifier(foreign_key)?;
            }
        }
        parts.push(format!("{table}(*)"));
    }
    Ok(parts.join(","))
}

/// Top-level filter as a `(key, value)` query pair.
fn filter_param(predicate: &Predicate) -> StoreResult<(String, String)> {
    match predicate {
        Predicate::Or(inner) => Ok(("or".to_string(), logic_tree(inner)?)),
        Predicate::Eq { column, value } if value.is_null() => {
            Ok((validate_identifier(column)?.to_string(), "is.null".into()))
        }
        Predicate::Eq { column, value } => Ok((
            validate_identifier(column)?.to_string(),
            format!("eq.{}", scalar(value)),
        )),
        Predicate::Gte { column, value } => Ok((
            validate_identifier(column)?.to_string(),
            format!("gte.{}", format_number(*value)),
        )),
        Predicate::Lt { column, value } => Ok((
            validate_identifier(column)?.to_string(),
            format!("lt.{}", format_number(*value)),
        )),
        Predicate::Contains { column, needle } => Ok((
            validate_identifier(column)?.to_string(),
            format!("ilike.*{needle}*"),
        )),
    }
}

/// `(cond,cond,...)` with values quoted where they contain reserved characters.
fn logic_tree(predicates: &[Predicate]) -> StoreResult<String> {
    let conditions = predicates
        .iter()
        .map(condition)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(format!("({})", conditions.join(",")))
}

fn condition(predicate: &Predicate) -> StoreResult<String> {
    Ok(match predicate {
        Predicate::Or(inner) => format!("or{}", logic_tree(inner)?),
        Predicate::Eq { column, value } if value.is_null() => {
            format!("{}.is.null", validate_identifier(column)?)
        }
        Predicate::Eq { column, value } => {
            format!("{}.eq.{}", validate_identifier(column)?, quote(&scalar(value)))
        }
        Predicate::Gte { column, value } => {
            format!("{}.gte.{}", validate_identifier(column)?, format_number(*value))
        }
        Predicate::Lt { column, value } => {
            format!("{}.lt.{}", validate_identifier(column)?, format_number(*value))
        }
        Predicate::Contains { column, needle } => format!(
            "{}.ilike.{}",
            validate_identifier(column)?,
            quote(&format!("*{needle}*"))
        ),
    })
}

fn quote(value: &str) -> String {
    let reserved = value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\' | ' '));
    if !reserved {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// [`BlobStore`] over the hosted storage API.
pub struct RestBlobStore {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestBlobStore {
    pub fn new(config: &ClinicConfig) -> BlobResult<Self> {
        Self::with_client(build_http_client(config)?, config)
    }

    pub fn with_client(client: Client, config: &ClinicConfig) -> BlobResult<Self> {
        Ok(Self {
            client,
            base: service_url(&config.api_url, "storage/v1/")?,
            api_key: config.api_key.clone(),
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> BlobResult<Url> {
        if path.is_empty() || path.starts_with('/') || path.split('/').any(|s| s == "..") {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.base.join(&format!("object/{bucket}/{path}"))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> BlobResult<()> {
        let url = self.object_url(bucket, path)?;
        let mut request = self
            .request(Method::POST, url)
            .header("x-upsert", if options.overwrite { "true" } else { "false" });
        if let Some(content_type) = &options.content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(max_age) = &options.cache_control {
            request = request.header(CACHE_CONTROL, format!("max-age={max_age}"));
        }

        let response = request.body(bytes).send().await?;
        check_blob_status(response).await?;
        debug!(bucket, path, "uploaded blob");
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BlobResult<()> {
        let url = self.base.join(&format!("object/{bucket}"))?;
        let response = self
            .request(Method::DELETE, url)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check_blob_status(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}object/public/{bucket}/{path}", self.base)
    }
}

async fn check_blob_status(response: Response) -> BlobResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), %body, "storage request failed");
    Err(BlobError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClinicConfig {
        ClinicConfig::new("https://clinic.example.com/", "anon-key")
    }

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_query_url_with_filters_and_join() {
        let store = RestTableStore::new(&config()).unwrap();
        let query = TableQuery::from("patients")
            .join_one("owners", "owner_id")
            .filter(Predicate::any(vec![
                Predicate::contains("name", "lab"),
                Predicate::contains("breed", "lab"),
            ]))
            .filter(Predicate::eq("species", "dog"))
            .filter(Predicate::gte("age", 1.0))
            .filter(Predicate::lt("age", 3.0));

        let url = store.query_url(&query).unwrap();
        assert_eq!(url.path(), "/rest/v1/patients");
        assert_eq!(
            pairs(&url),
            vec![
                ("select".into(), "*,owners(*)".into()),
                ("or".into(), "(name.ilike.*lab*,breed.ilike.*lab*)".into()),
                ("species".into(), "eq.dog".into()),
                ("age".into(), "gte.1".into()),
                ("age".into(), "lt.3".into()),
            ]
        );
    }

    #[test]
    fn test_order_and_null() {
        let store = RestTableStore::new(&config()).unwrap();
        let query = TableQuery::from("medical_records")
            .filter(Predicate::eq("patient_id", "p-1"))
            .filter(Predicate::eq("photo_url", Value::Null))
            .order_by("date", false);

        let url = store.query_url(&query).unwrap();
        assert_eq!(
            pairs(&url),
            vec![
                ("select".into(), "*".into()),
                ("patient_id".into(), "eq.p-1".into()),
                ("photo_url".into(), "is.null".into()),
                ("order".into(), "date.desc".into()),
            ]
        );
    }

    #[test]
    fn test_logic_tree_quotes_reserved_values() {
        let tree = logic_tree(&[
            Predicate::contains("name", "golden, ret"),
            Predicate::eq("breed", "say \"hi\""),
        ])
        .unwrap();
        assert_eq!(
            tree,
            r#"(name.ilike."*golden, ret*",breed.eq."say \"hi\"")"#
        );
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let store = RestTableStore::new(&config()).unwrap();
        let query = TableQuery::from("patients").filter(Predicate::eq("name&x", "a"));
        assert!(matches!(
            store.query_url(&query),
            Err(RemoteQueryError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_row_url() {
        let store = RestTableStore::new(&config()).unwrap();
        let url = store.row_url("owners", "o-1").unwrap();
        assert_eq!(url.path(), "/rest/v1/owners");
        assert_eq!(pairs(&url), vec![("id".into(), "eq.o-1".into())]);
    }

    #[test]
    fn test_blob_urls() {
        let store = RestBlobStore::new(&config()).unwrap();
        assert_eq!(
            store.public_url("pets", "pet-photos/p-1.jpg"),
            "https://clinic.example.com/storage/v1/object/public/pets/pet-photos/p-1.jpg"
        );
        assert_eq!(
            store.object_url("pets", "pet-photos/p-1.jpg").unwrap().as_str(),
            "https://clinic.example.com/storage/v1/object/pets/pet-photos/p-1.jpg"
        );
        assert!(store.object_url("pets", "../secrets").is_err());
    }
}
