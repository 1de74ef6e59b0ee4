//! Scripted collection API for unit tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_client::{Error, HttpRequest, HttpResponse, HttpTransport, Method, Session, SessionConfig};

type Handler = Box<dyn Fn(&HttpRequest) -> (u16, String) + Send + Sync>;

/// Mock transport answering each request through a routing closure.
///
/// `/authorize` is answered automatically. Every request is recorded.
pub struct MockApi {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Option<(String, Duration)>>,
}

impl MockApi {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> (u16, String) + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        })
    }

    /// Delays every response whose URL contains `pattern`.
    pub fn delay_matching(&self, pattern: &str, delay: Duration) {
        *self.delay.lock().unwrap() = Some((pattern.to_string(), delay));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose URL contains `pattern`.
    pub fn matching(&self, pattern: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(pattern))
            .collect()
    }

    pub fn session(self: &Arc<Self>) -> Arc<Session> {
        let config = SessionConfig::new("test-key").with_base_url("http://api.test/v2");
        Arc::new(Session::with_transport(config, self.clone()).unwrap())
    }
}

impl HttpTransport for MockApi {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send + '_>> {
        let (status, body) = if request.url.ends_with("/authorize") {
            (200, r#"{"token":"tok"}"#.to_string())
        } else {
            (self.handler)(&request)
        };
        let delay = self
            .delay
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(pattern, _)| request.url.contains(pattern.as_str()))
            .map(|(_, d)| *d);
        self.requests.lock().unwrap().push(request);

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            Ok(HttpResponse {
                status,
                body: body.into_bytes(),
            })
        })
    }
}

/// JSON for a remote file item.
pub fn file_json(id: &str, name: &str, size: u64, chunk_size: u64) -> String {
    let parts = courier_transfer::part_count(size, chunk_size).unwrap();
    format!(
        r#"{{"type":"file","id":"{id}","name":"{name}","size":{size},"multipart":{{"part_numbers":{parts},"chunk_size":{chunk_size}}}}}"#
    )
}

/// JSON for a remote link item.
pub fn link_json(id: &str, url: &str) -> String {
    format!(r#"{{"type":"link","id":"{id}","url":"{url}","meta":{{"title":"{url}"}}}}"#)
}

/// JSON for a collection response in `state` with the given items.
pub fn collection_json(id: &str, state: &str, items: &[String]) -> String {
    format!(
        r#"{{"id":"{id}","state":"{state}","items":[{}]}}"#,
        items.join(",")
    )
}

/// Default routing: signed URLs per part, successful PUTs and completion.
pub fn default_route(req: &HttpRequest, create_body: &str) -> (u16, String) {
    let url = req.url.as_str();
    if req.method == Method::POST && (url.ends_with("/transfers") || url.ends_with("/boards")) {
        return (201, create_body.to_string());
    }
    if url.contains("/upload-url/") {
        let part = url.rsplit("/upload-url/").next().unwrap_or("0");
        let file = url
            .split("/files/")
            .nth(1)
            .and_then(|s| s.split('/').next())
            .unwrap_or("x");
        return (
            200,
            format!(r#"{{"url":"https://bucket.test/{file}/{part}"}}"#),
        );
    }
    if url.starts_with("https://bucket.test/") {
        return (200, String::new());
    }
    if url.ends_with("/upload-complete") {
        return (200, r#"{"ok":true}"#.to_string());
    }
    if url.ends_with("/finalize") {
        let id = url
            .rsplit('/')
            .nth(1)
            .unwrap_or("x");
        return (
            200,
            format!(r#"{{"id":"{id}","state":"processing","url":"https://we.tl/{id}"}}"#),
        );
    }
    (404, r#"{"message":"no route"}"#.to_string())
}
