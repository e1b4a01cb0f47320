use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::json;

use super::{HttpRequest, HttpResponse, HttpSession, Method};
use crate::error::Result;

struct Route {
    method: Method,
    path: String,
    query: Option<(String, String)>,
    response: HttpResponse,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        if self.method != request.method || self.path != request.path {
            return false;
        }
        match &self.query {
            Some((key, value)) => request.query_value(key) == Some(value.as_str()),
            None => true,
        }
    }
}

/// An [`HttpSession`] that answers from canned responses and records what
/// it was asked.
///
/// Routes registered with a query constraint win over plain method + path
/// routes, regardless of registration order. Unmatched requests get a 404
/// with a backend-style error body.
#[derive(Default)]
pub struct ScriptedSession {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
    headers: HashMap<String, String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` (any query) with `response`.
    pub fn respond(&self, method: Method, path: &str, response: HttpResponse) -> &Self {
        lock(&self.routes).push(Route {
            method,
            path: path.to_string(),
            query: None,
            response,
        });
        self
    }

    /// Answer `method path` only when query parameter `key` equals `value`.
    pub fn respond_to_query(
        &self,
        method: Method,
        path: &str,
        key: &str,
        value: &str,
        response: HttpResponse,
    ) -> &Self {
        lock(&self.routes).push(Route {
            method,
            path: path.to_string(),
            query: Some((key.to_string(), value.to_string())),
            response,
        });
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Values of query parameter `key` across all recorded requests to `path`.
    pub fn query_values(&self, path: &str, key: &str) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.path == path)
            .filter_map(|r| r.query_value(key).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl HttpSession for ScriptedSession {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = {
            let routes = lock(&self.routes);
            routes
                .iter()
                .filter(|r| r.query.is_some())
                .chain(routes.iter().filter(|r| r.query.is_none()))
                .find(|r| r.matches(&request))
                .map(|r| r.response.clone())
        };

        lock(&self.requests).push(request.clone());

        Ok(response.unwrap_or_else(|| {
            HttpResponse::json(
                404,
                json!({
                    "Message": format!("No scripted response for {} {}", request.method, request.path),
                    "StatusCode": 404
                }),
            )
        }))
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }
}
