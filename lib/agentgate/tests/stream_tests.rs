//! Integration tests for upgrade handshakes against a local websocket server.

use std::net::SocketAddr;
use std::time::Duration;

use agentgate::{
    AgentClient, CallContext, Credential, Message, Params, PeerAddress, StreamDialer,
    Transport, TransportKind,
};
use assert2::{check, let_assert};
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// What the server saw during the handshake.
#[derive(Debug)]
struct Seen {
    path: String,
    headers: HeaderMap,
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

/// Accept one upgrade, send `hello`, then wait for the client to close.
fn spawn_greeter(listener: TcpListener) -> oneshot::Receiver<Seen> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept");
        let callback = move |request: &Request,
                             mut response: Response|
              -> Result<Response, ErrorResponse> {
            let seen = Seen {
                path: request.uri().path().to_string(),
                headers: request.headers().clone(),
            };
            let _ = tx.send(seen);
            response
                .headers_mut()
                .insert("x-agent", HeaderValue::from_static("edge-1"));
            Ok(response)
        };

        let mut ws = accept_hdr_async(tcp, callback).await.expect("server handshake");
        ws.send(Message::text("hello")).await.expect("send");
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });
    rx
}

/// Accept one connection and refuse the upgrade with `401`.
fn spawn_refuser(listener: TcpListener) {
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept");
        let callback = |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
            let refusal = http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header("www-authenticate", "Bearer")
                .body(Some("unauthorized".to_string()))
                .expect("response");
            Err(refusal)
        };
        let _ = accept_hdr_async(tcp, callback).await;
    });
}

/// Accept connections and never answer.
fn spawn_silent(listener: TcpListener) {
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
}

#[tokio::test]
async fn test_open_stream_and_receive() {
    let (listener, addr) = bind().await;
    let seen = spawn_greeter(listener);

    let peer = PeerAddress::parse(&format!("http://{addr}/agent/")).expect("peer");
    let client = AgentClient::builder(peer)
        .with_credential(Credential::bearer("t0k3n"))
        .build()
        .expect("client");

    let headers = Params::new().with("X-Tenant", "acme");
    let mut handle = client
        .open_stream(&CallContext::new(), "/v1/logs", &headers)
        .await
        .expect("stream opened");

    check!(handle.handshake().status() == 101);
    check!(handle.handshake().is_upgraded());
    check!(handle.handshake().header("x-agent") == Some("edge-1"));

    let seen = seen.await.expect("handshake seen");
    check!(seen.path == "/agent/v1/logs");
    check!(seen.headers.get("authorization").expect("credential") == "Bearer t0k3n");
    check!(seen.headers.get("x-tenant").expect("tenant") == "acme");

    let_assert!(Some(Ok(message)) = handle.stream_mut().next().await);
    check!(message.to_text().expect("text") == "hello");

    handle.stream_mut().close(None).await.expect("close");
}

#[tokio::test]
async fn test_caller_header_wins_over_credential() {
    let (listener, addr) = bind().await;
    let seen = spawn_greeter(listener);

    let peer = PeerAddress::parse(&format!("http://{addr}")).expect("peer");
    let client = AgentClient::builder(peer)
        .with_credential(Credential::bearer("t0k3n"))
        .build()
        .expect("client");

    let headers = Params::new().with("Authorization", "Bearer caller");
    let handle = client
        .open_stream(&CallContext::new(), "logs", &headers)
        .await
        .expect("stream opened");

    let seen = seen.await.expect("handshake seen");
    check!(seen.path == "/logs");
    let values: Vec<_> = seen.headers.get_all("authorization").iter().collect();
    check!(values == [&HeaderValue::from_static("Bearer caller")]);

    let (mut stream, _) = handle.into_parts();
    stream.close(None).await.expect("close");
}

#[tokio::test]
async fn test_refused_upgrade_exposes_response() {
    let (listener, addr) = bind().await;
    spawn_refuser(listener);

    let transport = Transport::new().expect("transport");
    let dialer = StreamDialer::from_transport(&transport);
    let peer = PeerAddress::parse(&format!("http://{addr}")).expect("peer");

    let result = dialer
        .open_stream(&CallContext::new(), &peer, "/v1/exec", &Params::new())
        .await;

    let_assert!(Err(err) = result);
    check!(err.transport_kind() == Some(TransportKind::Handshake));
    check!(err.status() == Some(401));
    check!(err.is_client_error());
    let_assert!(Some(handshake) = err.handshake());
    check!(!handshake.is_upgraded());
    check!(handshake.header("www-authenticate") == Some("Bearer"));
    if let Some(body) = handshake.body() {
        check!(body.as_ref() == b"unauthorized");
    }
}

#[tokio::test]
async fn test_cancel_during_handshake() {
    let (listener, addr) = bind().await;
    spawn_silent(listener);

    let transport = Transport::new().expect("transport");
    let dialer = StreamDialer::from_transport(&transport);
    let peer = PeerAddress::parse(&format!("http://{addr}")).expect("peer");

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        dialer.open_stream(&ctx, &peer, "/v1/logs", &Params::new()),
    )
    .await
    .expect("cancelled promptly");

    let_assert!(Err(err) = result);
    check!(err.transport_kind() == Some(TransportKind::Cancelled));
}

#[tokio::test]
async fn test_handshake_timeout() {
    let (listener, addr) = bind().await;
    spawn_silent(listener);

    let transport = Transport::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .expect("transport");
    let dialer = StreamDialer::from_transport(&transport);
    let peer = PeerAddress::parse(&format!("http://{addr}")).expect("peer");

    let result = dialer
        .open_stream(&CallContext::new(), &peer, "/v1/logs", &Params::new())
        .await;

    let_assert!(Err(err) = result);
    check!(err.transport_kind() == Some(TransportKind::Timeout));
    check!(!err.is_cancelled());
}

#[tokio::test]
async fn test_unreachable_peer() {
    let transport = Transport::new().expect("transport");
    let dialer = StreamDialer::from_transport(&transport);
    let peer = PeerAddress::parse("http://127.0.0.1:1").expect("peer");

    let result = dialer
        .open_stream(&CallContext::new(), &peer, "/v1/logs", &Params::new())
        .await;

    let_assert!(Err(err) = result);
    check!(err.is_connection());
    check!(err.status().is_none());
}
