use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use edgar_mirror::{Edgar, EdgarConfig, EdgarUrls, RetryPolicy};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

#[allow(dead_code)]
pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

#[allow(dead_code)]
pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

#[allow(dead_code)]
pub fn read_fixture_bytes(relative: impl AsRef<Path>) -> Vec<u8> {
    fs::read(fixture_path(relative)).expect("fixture file should be readable")
}

#[allow(dead_code)]
pub fn edgar() -> Edgar {
    Edgar::new("test_agent example@example.com").unwrap()
}

/// Client pointed at a local responder, with no pacing and millisecond backoff.
#[allow(dead_code)]
pub fn local_edgar(base: &str) -> Edgar {
    Edgar::with_config(local_config(base)).unwrap()
}

/// Configuration behind [`local_edgar`], for tests that adjust it further.
#[allow(dead_code)]
pub fn local_config(base: &str) -> EdgarConfig {
    EdgarConfig::new(
        "test_agent example@example.com",
        100,
        Duration::from_secs(5),
        Some(EdgarUrls {
            archives: base.to_string(),
        }),
    )
    .with_request_delay(Duration::ZERO)
    .with_retry(RetryPolicy {
        max_retries: 2,
        backoff_base: Duration::from_millis(5),
        backoff_factor: 2.0,
        max_backoff: Duration::from_millis(20),
    })
}

/// A scripted HTTP responder on `127.0.0.1`.
///
/// Each connection gets the next `(status, body)` pair; once the script runs out the last
/// pair is repeated. Every response closes its connection.
#[allow(dead_code)]
pub struct Responder {
    pub base: String,
    hits: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl Responder {
    pub async fn start(script: Vec<(u16, Vec<u8>)>) -> Self {
        let raw = script
            .into_iter()
            .map(|(status, body)| {
                let mut response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                )
                .into_bytes();
                response.extend_from_slice(&body);
                response
            })
            .collect();
        Self::start_raw(raw).await
    }

    /// Like [`Responder::start`], but each entry is written to the socket verbatim.
    pub async fn start_raw(script: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            let mut script = script.into_iter();
            let mut last =
                b"HTTP/1.1 500 Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    .to_vec();
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                if let Some(next) = script.next() {
                    last = next;
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let _ = socket.write_all(&last).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { base, hits }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
