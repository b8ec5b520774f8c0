// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::seq_record;
use event_sink::transport::Transport;
use event_sink::{Batch, DeliveryError, Sink, SinkConfig};
use rcgen::CertifiedKey;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// An HTTPS collector presenting a freshly generated self-signed certificate.
/// Answers every complete request with a 200.
struct SelfSignedCollector {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
}

impl SelfSignedCollector {
    async fn start() -> Self {
        let names = vec!["localhost".to_string(), "127.0.0.1".to_string()];
        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(names).expect("self-signed certificate");
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let server_config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_no_client_auth()
            .with_single_cert(vec![cert.der().clone()], key)
            .expect("server certificate");
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(AtomicUsize::new(0));
        let served = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let served = Arc::clone(&served);
                tokio::spawn(async move {
                    // A client that rejects the certificate aborts the handshake.
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    while !request_complete(&buf) {
                        match tls.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    served.fetch_add(1, Ordering::SeqCst);
                    let _ = tls.write_all(OK_RESPONSE).await;
                    let _ = tls.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    fn url(&self) -> String {
        format!("https://{}/submit", self.addr)
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Whether `buf` holds a full HTTP/1.1 request, chunked or length-delimited.
fn request_complete(buf: &[u8]) -> bool {
    let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let body = &buf[header_end + 4..];

    if head.contains("transfer-encoding: chunked") {
        return body.ends_with(b"0\r\n\r\n");
    }
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|val| val.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= content_length
}

fn tls_config(url: String, insecure: bool) -> SinkConfig {
    SinkConfig {
        insecure,
        request_timeout: Duration::from_secs(2),
        ..SinkConfig::new(url)
    }
}

#[tokio::test]
async fn insecure_sink_delivers_to_self_signed_collector() {
    let collector = SelfSignedCollector::start().await;
    let mut sink = Sink::new(tls_config(collector.url(), true)).expect("sink");
    sink.start().expect("start");

    sink.send(seq_record(0)).await.expect("send");
    sink.stop().await;

    let stats = sink.stats();
    assert_eq!(stats.batches_sent, 1);
    assert_eq!(stats.batches_failed, 0);
    assert_eq!(collector.requests(), 1);
}

#[tokio::test]
async fn default_sink_rejects_self_signed_collector() {
    let collector = SelfSignedCollector::start().await;
    let mut sink = Sink::new(tls_config(collector.url(), false)).expect("sink");
    sink.start().expect("start");

    sink.send(seq_record(0)).await.expect("send");
    sink.stop().await;

    let stats = sink.stats();
    assert_eq!(stats.batches_sent, 0);
    assert_eq!(stats.batches_failed, 1);
    assert_eq!(collector.requests(), 0);
}

#[tokio::test]
async fn certificate_rejection_is_a_request_error() {
    let collector = SelfSignedCollector::start().await;
    let verifying = Transport::new(&tls_config(collector.url(), false)).expect("transport");
    let insecure = Transport::new(&tls_config(collector.url(), true)).expect("transport");

    let batch = Batch::new(vec![seq_record(0)]).expect("non-empty batch");
    let result = verifying.send(batch).await;
    assert!(matches!(result, Err(DeliveryError::Request(_))));

    // The insecure client is independent of the verifying one.
    let batch = Batch::new(vec![seq_record(1)]).expect("non-empty batch");
    assert!(insecure.send(batch).await.is_ok());
    assert_eq!(collector.requests(), 1);
}
