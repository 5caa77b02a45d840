use std::collections::HashMap;

/// Progress marker carried by a response and replayed onto the caller's
/// copy: `Committed` means the chain ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    New,
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            http_only: false,
            secure: false,
        }
    }
}

/// The response a valve chain writes into. Tracks whether any valve set a
/// status explicitly, so a faulted request can fall back to the fault's
/// status instead of silently reporting the untouched default.
#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    reason_phrase: String,
    version: String,
    state: ResponseState,
    headers: HashMap<String, Vec<String>>,
    cookies: Vec<Cookie>,
    body: Vec<u8>,
    explicit_status: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status_code: 200,
            reason_phrase: "OK".to_string(),
            version: "HTTP/1.1".to_string(),
            state: ResponseState::New,
            headers: HashMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
            explicit_status: false,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    pub fn set_status(&mut self, status_code: u16, reason_phrase: impl Into<String>) {
        self.status_code = status_code;
        self.reason_phrase = reason_phrase.into();
        self.explicit_status = true;
    }

    pub fn has_explicit_status(&self) -> bool {
        self.explicit_status
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ResponseState) {
        self.state = state;
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.entry(name.into()).or_default().push(value.into());
    }

    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name).map(Vec::as_slice)
    }

    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_responses_have_no_explicit_status() {
        let response = Response::new();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.state(), ResponseState::New);
        assert!(!response.has_explicit_status());
    }

    #[test]
    fn set_status_is_remembered() {
        let mut response = Response::new();
        response.set_status(404, "Not Found");
        assert!(response.has_explicit_status());
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.reason_phrase(), "Not Found");
    }

    #[test]
    fn body_appends_rather_than_replaces() {
        let mut response = Response::new();
        response.append_body(b"hello ");
        response.append_body(b"world");
        assert_eq!(response.body(), b"hello world");
    }
}
