use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

const MAX_ERROR_BODY_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error("request failed after {attempts} attempt(s): HTTP status {status}{}", body_detail(.body))]
    Status {
        status: u16,
        body: String,
        attempts: usize,
    },

    #[error("request failed after {attempts} attempt(s): transport error: {message}")]
    Transport { message: String, attempts: usize },

    #[error("request failed: response decode failed: {0}")]
    Decode(String),
}

impl HttpError {
    pub(crate) fn attempts(&self) -> usize {
        match self {
            Self::Status { attempts, .. } | Self::Transport { attempts, .. } => *attempts,
            Self::Decode(_) => 1,
        }
    }
}

fn body_detail(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" ({body})")
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

pub(crate) fn get_text_with_retries(
    url: &str,
    referer: &str,
    query: &[(&str, &str)],
    policy: &RetryPolicy,
) -> Result<String, HttpError> {
    let attempts = policy.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    let mut attempt = 1;
    loop {
        let mut request = agent.get(url);
        if !referer.is_empty() {
            request = request.set("Referer", referer);
        }
        for (key, value) in query {
            request = request.query(key, value);
        }

        debug!(url, attempt, "sending request");
        let retryable = match request.call() {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| HttpError::Decode(err.to_string()));
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response
                    .into_string()
                    .unwrap_or_default()
                    .trim()
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect::<String>();
                let err = HttpError::Status {
                    status,
                    body,
                    attempts: attempt,
                };
                if !should_retry_http_status(status) {
                    return Err(err);
                }
                err
            }
            Err(ureq::Error::Transport(err)) => HttpError::Transport {
                message: err.to_string(),
                attempts: attempt,
            },
        };

        if attempt >= attempts {
            return Err(retryable);
        }
        warn!(url, attempt, error = %retryable, "retrying request");
        thread::sleep(policy.retry_delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, mpsc};

    #[derive(Debug, Clone)]
    enum Reply {
        Now(u16, &'static str),
        After(Duration, u16, &'static str),
    }

    struct FakeServer {
        url: String,
        hits: Arc<AtomicUsize>,
        stop: mpsc::Sender<()>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl FakeServer {
        fn start(replies: Vec<Reply>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind fake server");
            listener.set_nonblocking(true).expect("nonblocking listener");
            let url = format!("http://{}", listener.local_addr().expect("local addr"));
            let hits = Arc::new(AtomicUsize::new(0));
            let replies = Arc::new(Mutex::new(VecDeque::from(replies)));
            let (stop, stopped) = mpsc::channel::<()>();

            let counter = Arc::clone(&hits);
            let handle = thread::spawn(move || {
                while stopped.try_recv().is_err() {
                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            counter.fetch_add(1, Ordering::SeqCst);
                            let reply = replies
                                .lock()
                                .expect("replies lock")
                                .pop_front()
                                .unwrap_or(Reply::Now(200, "default"));
                            thread::spawn(move || {
                                read_head(&mut stream);
                                answer(&mut stream, reply);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                url,
                hits,
                stop,
                handle: Some(handle),
            }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl Drop for FakeServer {
        fn drop(&mut self) {
            let _ = self.stop.send(());
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn read_head(stream: &mut TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_millis(200)));
        let mut buf = [0_u8; 1024];
        let mut seen = Vec::new();
        while let Ok(read) = stream.read(&mut buf) {
            if read == 0 {
                break;
            }
            seen.extend_from_slice(&buf[..read]);
            if seen.windows(4).any(|window| window == b"\r\n\r\n") {
                break;
            }
        }
    }

    fn answer(stream: &mut TcpStream, reply: Reply) {
        let (status, body) = match reply {
            Reply::Now(status, body) => (status, body),
            Reply::After(delay, status, body) => {
                thread::sleep(delay);
                (status, body)
            }
        };
        let _ = write!(
            stream,
            "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.flush();
    }

    fn policy(attempts: usize, read_timeout_ms: u64) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(read_timeout_ms),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn retries_server_errors_and_throttling_until_success() {
        let server = FakeServer::start(vec![
            Reply::Now(500, "boom"),
            Reply::Now(429, "slow down"),
            Reply::Now(200, "{\"list\":[]}"),
        ]);

        let body = get_text_with_retries(&server.url, "", &[("ac", "detail")], &policy(3, 200))
            .expect("third attempt succeeds");
        assert_eq!(body, "{\"list\":[]}");
        assert_eq!(server.hits(), 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let server = FakeServer::start(vec![Reply::Now(404, "missing")]);

        let err = get_text_with_retries(&server.url, "https://ref.test", &[], &policy(5, 200))
            .expect_err("404 fails immediately");
        assert!(matches!(err, HttpError::Status { status: 404, .. }));
        assert_eq!(err.attempts(), 1);
        assert!(err.to_string().contains("HTTP status 404 (missing)"), "{err}");
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn read_timeout_is_retried() {
        let server = FakeServer::start(vec![
            Reply::After(Duration::from_millis(120), 200, "late"),
            Reply::Now(200, "ok"),
        ]);

        let body = get_text_with_retries(&server.url, "", &[], &policy(2, 20))
            .expect("timeout is retried");
        assert_eq!(body, "ok");
        assert_eq!(server.hits(), 2);
    }

    #[test]
    fn exhausted_retries_report_attempt_count() {
        let server = FakeServer::start(vec![Reply::Now(503, "down"), Reply::Now(503, "down")]);

        let err = get_text_with_retries(&server.url, "", &[], &policy(2, 200))
            .expect_err("every attempt fails");
        let message = err.to_string();
        assert!(
            message.contains("after 2 attempt(s)") && message.contains("HTTP status 503"),
            "{message}"
        );
        assert_eq!(server.hits(), 2);
    }
}
