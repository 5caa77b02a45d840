use std::collections::HashMap;

/// An incoming request as the valve chain sees it. The dispatched flag is
/// the chain's short-circuit: once a valve sets it, later valves never
/// run.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    uri: String,
    version: String,
    headers: HashMap<String, Vec<String>>,
    body: Vec<u8>,
    dispatched: bool,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            dispatched: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.entry(name.into()).or_default().push(value.into());
    }

    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name).map(Vec::as_slice)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Mark the request answered; the chain stops after the current valve.
    pub fn set_dispatched(&mut self) {
        self.dispatched = true;
    }

    /// Normalize the URI path before the valves see it: collapse duplicate
    /// slashes, force a leading slash, keep the query string untouched.
    pub fn prepare(&mut self) {
        self.uri = normalize_path(&self.uri);
    }
}

fn normalize_path(raw: &str) -> String {
    let (path, query) = match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    };

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }

    match query {
        Some(query) => format!("{normalized}?{query}"),
        None => normalized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_collapses_duplicate_slashes() {
        let mut request = Request::new("GET", "//shop///cart/");
        request.prepare();
        assert_eq!(request.uri(), "/shop/cart");
    }

    #[test]
    fn prepare_defaults_an_empty_path() {
        for raw in ["", "/", "///"] {
            let mut request = Request::new("GET", raw);
            request.prepare();
            assert_eq!(request.uri(), "/", "raw: {raw:?}");
        }
    }

    #[test]
    fn prepare_keeps_the_query_string() {
        let mut request = Request::new("GET", "/search//items?q=a//b");
        request.prepare();
        assert_eq!(request.uri(), "/search/items?q=a//b");
    }

    #[test]
    fn headers_are_multi_valued() {
        let request = Request::new("GET", "/")
            .with_header("accept", "text/html")
            .with_header("accept", "application/json");
        assert_eq!(
            request.header("accept"),
            Some(["text/html".to_string(), "application/json".to_string()].as_slice())
        );
        assert_eq!(request.header("cookie"), None);
    }
}
