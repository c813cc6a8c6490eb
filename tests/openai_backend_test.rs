//! OpenAiBackend 集成测试：本地 HTTP 服务模拟 OpenAI 兼容端点，统计实际收到的请求数

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use lessonsmith::config::LlmSection;
use lessonsmith::core::{GenerationError, RetryExecutor, RetryPolicy, Sleeper};
use lessonsmith::llm::{GenerationBackend, ImageRequest, LlmError, OpenAiBackend};
use lessonsmith::prompt::Message;

const RATE_LIMIT_BODY: &str = r#"{"error":{"message":"Rate limit reached for requests","type":"requests","param":null,"code":"rate_limit_exceeded"}}"#;

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// 读完一个请求（头 + Content-Length 指定的 body），避免未读数据导致连接被 reset
async fn read_request(socket: &mut TcpStream) {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);
        let Some(header_end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if data.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

/// 对每个请求都返回同一状态码与 body 的本地服务；返回 (base_url, 请求计数)
async fn serve_always(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{addr}/v1"), hits)
}

fn backend(base_url: String) -> OpenAiBackend {
    let llm = LlmSection {
        base_url: Some(base_url),
        ..LlmSection::default()
    };
    OpenAiBackend::new(&llm, "sk-test").unwrap()
}

fn messages() -> Vec<Message> {
    vec![Message::system("You plan lessons."), Message::user("Photosynthesis")]
}

#[tokio::test]
async fn test_rate_limited_text_call_sends_single_request() {
    let (url, hits) = serve_always("429 Too Many Requests", RATE_LIMIT_BODY).await;
    let backend = backend(url);

    let err = tokio::time::timeout(Duration::from_secs(10), backend.generate_text(&messages()))
        .await
        .expect("a rate-limited call must return without internal backoff")
        .unwrap_err();

    assert!(matches!(err, LlmError::RateLimited { .. }));
    assert!(err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_budget_bounds_http_requests() {
    let (url, hits) = serve_always("429 Too Many Requests", RATE_LIMIT_BODY).await;
    let backend = backend(url);
    let sleeper = Arc::new(RecordingSleeper::default());
    let retry = RetryExecutor::new(RetryPolicy::new(3, 4.0).unwrap()).with_sleeper(sleeper.clone());

    let msgs = messages();
    let backend = &backend;
    let msgs = &msgs;
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        retry.execute(move || async move { backend.generate_text(msgs).await }),
    )
    .await
    .expect("retry loop must finish within its own budget");

    assert!(matches!(
        result,
        Err(GenerationError::RetryExhausted { attempts: 3, .. })
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_secs(4), Duration::from_secs(8)]
    );
}

#[tokio::test]
async fn test_rate_limited_image_call_sends_single_request() {
    let (url, hits) = serve_always("429 Too Many Requests", RATE_LIMIT_BODY).await;
    let backend = backend(url);
    let request = ImageRequest {
        prompt: "water cycle".to_string(),
        size: "1024x1024".to_string(),
    };

    let err = tokio::time::timeout(Duration::from_secs(10), backend.generate_image(&request))
        .await
        .expect("a rate-limited call must return without internal backoff")
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried_by_client() {
    let (url, hits) = serve_always("500 Internal Server Error", "upstream exploded").await;
    let backend = backend(url);

    let err = tokio::time::timeout(Duration::from_secs(10), backend.generate_text(&messages()))
        .await
        .expect("a 5xx call must return without internal backoff")
        .unwrap_err();

    assert!(!err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsupported_request_size_fails_before_sending() {
    let (url, hits) = serve_always("429 Too Many Requests", RATE_LIMIT_BODY).await;
    let backend = backend(url);
    let request = ImageRequest {
        prompt: "water cycle".to_string(),
        size: "1792x1024".to_string(),
    };

    let err = backend.generate_image(&request).await.unwrap_err();
    assert!(matches!(err, LlmError::Api { status: None, .. }));
    assert!(!err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
