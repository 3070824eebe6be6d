use std::collections::HashSet;

use serde_json::Value;

use super::client::KoboClient;
use super::request::ApiRequest;
use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Value>,
}

/// Decoded body of a list call.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBody {
    Paged(Page),
    /// A resource that is not paginated at all.
    Single(Value),
}

impl Page {
    /// Interpret a response body received from `url`.
    pub fn parse(url: &str, body: Value) -> Result<PageBody> {
        let mut obj = match body {
            Value::Array(results) => {
                return Ok(PageBody::Paged(Page {
                    count: Some(results.len() as u64),
                    next: None,
                    previous: None,
                    results,
                }));
            }
            Value::Object(obj) => obj,
            other => return Ok(PageBody::Single(other)),
        };

        let next = link(url, &obj, "next")?;

        let results = match obj.remove("results") {
            Some(Value::Array(results)) => results,
            Some(_) => return Err(Error::protocol(url, "`results` is not an array")),
            None if next.is_some() => {
                return Err(Error::protocol(url, "`next` is set but `results` is missing"));
            }
            None => return Ok(PageBody::Single(Value::Object(obj))),
        };

        let previous = link(url, &obj, "previous")?;
        let count = obj.get("count").and_then(Value::as_u64);

        Ok(PageBody::Paged(Page {
            count,
            next,
            previous,
            results,
        }))
    }
}

fn link(url: &str, obj: &serde_json::Map<String, Value>, field: &str) -> Result<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::protocol(url, format!("`{field}` is not a URL"))),
    }
}

/// Fetch a list resource with `limit=page_size`.
///
/// With `follow_all`, keeps requesting the `next` link until it is empty and
/// returns every record in the order the server sent them. Otherwise returns
/// the first page only. Pages are requested one at a time.
///
/// A `next` link seen before, or a last page that leaves `count` unmet, is a
/// protocol error.
pub async fn fetch_all(
    client: &KoboClient,
    request: &ApiRequest,
    page_size: u32,
    follow_all: bool,
) -> Result<Vec<Value>> {
    if page_size == 0 {
        return Err(Error::InvalidInput("page size must be a positive integer".to_string()));
    }

    let mut request = request.clone().query("limit", page_size);
    let mut records = Vec::new();
    let mut page_index = 0usize;
    let mut followed = HashSet::new();

    loop {
        let url = client.url_for(&request.path)?.to_string();
        let body = client.request_json(&request).await?;

        let page = match Page::parse(&url, body)? {
            PageBody::Paged(page) => page,
            PageBody::Single(value) if page_index == 0 => {
                records.push(value);
                break;
            }
            PageBody::Single(_) => {
                return Err(Error::protocol(&url, "Expected a page of results"));
            }
        };

        let received = page.results.len();
        records.extend(page.results);
        page_index += 1;

        tracing::debug!(
            "Fetched page {page_index} from {url}: {received} records ({} of {:?})",
            records.len(),
            page.count
        );

        match page.next {
            Some(next) if follow_all => {
                if received == 0 {
                    return Err(Error::protocol(&url, "Empty page but `next` is set"));
                }
                if !followed.insert(next.clone()) {
                    return Err(Error::protocol(&url, format!("`next` repeats an earlier page: {next}")));
                }
                request = ApiRequest::get(next);
            }
            None if follow_all => {
                if let Some(count) = page.count.filter(|count| *count > records.len() as u64) {
                    return Err(Error::protocol(
                        &url,
                        format!("`next` is empty after {} of {count} records", records.len()),
                    ));
                }
                break;
            }
            _ => break,
        }
    }

    Ok(records)
}
