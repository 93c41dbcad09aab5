use std::time::Duration;

use fishnet_core::Job;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::WorkerError;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(15);
const UPDATE_HINT: &str = "Please restart fishnet to upgrade.";

/// Blocking JSON client for the job server.
pub struct JobClient {
    http: Client,
    endpoint: String,
    user_agent: String,
}

/// What a `POST acquire`/`POST analysis`/`POST move` call yielded.
pub enum Acquired {
    /// 204: no job available (or progress report accepted, nothing to do).
    None,
    /// 200 with a job body.
    Job(Job),
}

impl JobClient {
    pub fn new(endpoint: String, user_agent: String) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(SOCKET_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint,
            user_agent,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<Response> {
        Ok(self
            .http
            .post(self.url(path))
            .header("User-Agent", &self.user_agent)
            .json(body)
            .send()?)
    }

    /// `POST acquire` or `POST analysis/<id>` / `POST move/<id>` — all three
    /// share the same response classification.
    pub fn submit<B: Serialize>(&self, path: &str, body: &B) -> Result<Acquired, WorkerError> {
        let resp = self
            .post_json(path, body)
            .map_err(|e| WorkerError::Other(e))?;
        classify(resp)
    }

    /// Best-effort abort; failures are swallowed by the caller.
    pub fn abort<B: Serialize>(&self, job_id: &str, body: &B) -> anyhow::Result<()> {
        self.post_json(&format!("abort/{job_id}"), body)?;
        Ok(())
    }
}

fn classify(resp: Response) -> Result<Acquired, WorkerError> {
    let status = resp.status();

    if status == StatusCode::NO_CONTENT {
        return Ok(Acquired::None);
    }

    if status.is_success() {
        let job: Job = resp
            .json()
            .map_err(|e| WorkerError::Other(anyhow::Error::from(e)))?;
        return Ok(Acquired::Job(job));
    }

    let body_text = resp.text().unwrap_or_default();

    if status.is_client_error() {
        if wants_update(&body_text) {
            return Err(WorkerError::UpdateRequired);
        }
        return Err(WorkerError::HttpClient {
            status: status.as_u16(),
            body: body_text,
        });
    }

    Err(WorkerError::HttpServer {
        status: status.as_u16(),
        body: body_text,
    })
}

fn wants_update(body: &str) -> bool {
    let parsed: Result<Value, _> = serde_json::from_str(body);
    match parsed {
        Ok(value) => value
            .get("error")
            .and_then(Value::as_str)
            .map(|msg| msg.contains(UPDATE_HINT))
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_hint_detected_in_error_body() {
        assert!(wants_update(r#"{"error": "Please restart fishnet to upgrade."}"#));
    }

    #[test]
    fn other_four_oh_x_bodies_do_not_trigger_update() {
        assert!(!wants_update(r#"{"error": "invalid fen"}"#));
        assert!(!wants_update("not json"));
        assert!(!wants_update(""));
    }

    /// A single-request-at-a-time raw HTTP/1.1 stand-in for the job server,
    /// good enough to exercise `JobClient`'s status-code classification
    /// against a real socket instead of mocking `reqwest`.
    fn serve_once(response_status_line: &str, body: &str) -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let response_status_line = response_status_line.to_string();
        let body = body.to_string();

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "{response_status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
        });

        format!("http://{addr}/")
    }

    #[test]
    fn submit_classifies_204_as_no_job() {
        let endpoint = serve_once("HTTP/1.1 204 No Content", "");
        let client = JobClient::new(endpoint, "fishnet test".to_string()).unwrap();
        let outcome = client.submit("acquire", &serde_json::json!({})).unwrap();
        assert!(matches!(outcome, Acquired::None));
    }

    #[test]
    fn submit_classifies_4xx_update_hint_as_update_required() {
        let endpoint = serve_once(
            "HTTP/1.1 400 Bad Request",
            r#"{"error": "Please restart fishnet to upgrade."}"#,
        );
        let client = JobClient::new(endpoint, "fishnet test".to_string()).unwrap();
        let err = client
            .submit("acquire", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, WorkerError::UpdateRequired));
    }

    #[test]
    fn submit_classifies_5xx_as_http_server_error() {
        let endpoint = serve_once("HTTP/1.1 503 Service Unavailable", "down for maintenance");
        let client = JobClient::new(endpoint, "fishnet test".to_string()).unwrap();
        let err = client
            .submit("acquire", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, WorkerError::HttpServer { status: 503, .. }));
    }
}
