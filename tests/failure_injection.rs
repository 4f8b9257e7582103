//! Failure injection tests for the proxy.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

mod common;

use common::http_response;

#[tokio::test]
async fn refused_backend_yields_bad_gateway() {
    let (proxy, shutdown) = common::start_proxy(common::closed_port(), |_| {}).await;

    let res = common::client()
        .get(format!("http://{}/anything", proxy))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn silent_backend_yields_gateway_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                drop(socket);
            });
        }
    });

    let (proxy, shutdown) = common::start_proxy(backend, |config| {
        config.timeouts.response_secs = 1;
    })
    .await;

    let res = common::client()
        .get(format!("http://{}/slow", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    shutdown.trigger();
}

#[tokio::test]
async fn malformed_backend_response_yields_bad_gateway() {
    let (backend, _seen) =
        common::start_backend(|_| async { b"this is not http\r\n\r\n".to_vec() }).await;
    let (proxy, shutdown) = common::start_proxy(backend, |_| {}).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn backend_disconnect_mid_stream_aborts_caller_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n\
                            Content-Length: 100\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&[7u8; 10]).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    let (proxy, shutdown) = common::start_proxy(backend, |_| {}).await;

    let res = common::client()
        .get(format!("http://{}/file", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.is_err(), "truncated body must not look complete");

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_html_is_rejected() {
    let (backend, _seen) = common::start_backend(|_| async {
        http_response("200 OK", &[("Content-Type", "text/html")], &[b'x'; 4096])
    })
    .await;
    let (proxy, shutdown) = common::start_proxy(backend, |config| {
        config.rewrite.max_html_bytes = 1024;
    })
    .await;

    let res = common::client()
        .get(format!("http://{}/big.html", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn failed_requests_are_never_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let (backend, _seen) = common::start_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { http_response("503 Service Unavailable", &[], b"down") }
    })
    .await;
    let (proxy, shutdown) = common::start_proxy(backend, |_| {}).await;

    let res = common::client()
        .post(format!("http://{}/orders", proxy))
        .body("order")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "down");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one forwarding hop");

    shutdown.trigger();
}

#[tokio::test]
async fn caller_disconnect_closes_backend_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
                            Transfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                loop {
                    let chunk = b"6\r\ntick\n\n\r\n";
                    if socket.write_all(chunk).await.is_err() || socket.flush().await.is_err() {
                        let _ = closed_tx.send(());
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            });
        }
    });

    let (proxy, shutdown) = common::start_proxy(backend, |_| {}).await;

    let mut res = common::client()
        .get(format!("http://{}/events", proxy))
        .send()
        .await
        .unwrap();
    let first = res.chunk().await.unwrap().unwrap();
    assert!(first.starts_with(b"tick"));
    drop(res);

    tokio::time::timeout(Duration::from_secs(5), closed_rx.recv())
        .await
        .expect("backend stream still open after the caller left");

    shutdown.trigger();
}

#[tokio::test]
async fn slow_caller_holds_back_backend_reads() {
    const TOTAL: usize = 256 * 1024 * 1024;
    const CHUNK: usize = 64 * 1024;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    let written = Arc::new(AtomicUsize::new(0));
    let counter = written.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n\
                     Content-Length: {}\r\n\r\n",
                    TOTAL
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                let chunk = vec![9u8; CHUNK];
                let mut sent = 0;
                while sent < TOTAL {
                    if socket.write_all(&chunk).await.is_err() {
                        return;
                    }
                    sent += CHUNK;
                    counter.fetch_add(CHUNK, Ordering::SeqCst);
                }
            });
        }
    });

    let (proxy, shutdown) = common::start_proxy(backend, |_| {}).await;

    let mut res = common::client()
        .get(format!("http://{}/huge.bin", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let first = res.chunk().await.unwrap().unwrap();
    assert!(!first.is_empty());

    // The caller stops reading; only socket and frame buffers may fill up.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let ahead = written.load(Ordering::SeqCst);
    assert!(
        ahead < TOTAL / 4,
        "backend wrote {ahead} bytes while the caller was not reading"
    );

    drop(res);
    shutdown.trigger();
}
