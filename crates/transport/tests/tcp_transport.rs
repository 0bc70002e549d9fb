use std::io::IsTerminal;

use futures::StreamExt;
use tokio::{io::AsyncWriteExt, net::TcpListener};
use tracing_subscriber::EnvFilter;
use transport::{Message, OutgoingMessage, Request, split, testing::frame_messages};

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    let _ = color_eyre::install();
}

#[tokio::test]
async fn handshake_then_messages_over_tcp() -> eyre::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let debuggee = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        socket
            .write_all(b"Type: connect\r\nV8-Version: 5.1.281.103\r\nProtocol-Version: 1\r\nEmbedding-Host: node v6.11.0\r\nContent-Length: 0\r\n\r\n")
            .await?;
        socket
            .write_all(&frame_messages(&[
                serde_json::json!({"seq": 1, "type": "event", "event": "break", "body": {"sourceLine": 0}}),
                serde_json::json!({"type": "output", "output": "listening\n"}),
            ]))
            .await?;

        let (mut reader, _writer) = split(socket);
        let request = reader.next().await;
        Ok::<_, eyre::Report>(request)
    });

    let (mut reader, mut writer) = transport::connect(addr).await?;

    let first = reader.next().await.expect("stream ended")?;
    assert!(matches!(first, Message::Event(e) if e.event == "break"));
    let second = reader.next().await.expect("stream ended")?;
    assert!(matches!(second, Message::Output(o) if o.output == "listening\n"));

    writer
        .send(OutgoingMessage::Request(Request {
            seq: 1,
            command: "continue".to_string(),
            arguments: None,
        }))
        .await?;

    let received = debuggee.await??.expect("client closed")?;
    assert!(matches!(received, Message::Request(r) if r.command == "continue" && r.seq == 1));
    Ok(())
}

#[test]
fn random_port_is_bindable() -> eyre::Result<()> {
    let port = transport::get_random_tcp_port()?;
    assert_ne!(port, 0);
    std::net::TcpListener::bind(("127.0.0.1", port))?;
    Ok(())
}
