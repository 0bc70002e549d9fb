use std::{io::IsTerminal, time::Duration};

use debugger::{DebugSession, Event, OutputStream, SessionConfig, SteppingKind};
use futures::StreamExt;
use serde_json::json;
use tokio::{io::AsyncWriteExt, net::TcpListener};
use tracing_subscriber::EnvFilter;
use transport::{Message, OutgoingMessage, Response, split, testing::frame_message};

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

async fn next_event(events: &mut debugger::EventReceiver) -> Event {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn attach_over_tcp() -> eyre::Result<()> {
    let socket = TcpListener::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?;

    // A debuggee that greets, announces a break, answers one step and
    // then goes away.
    let debuggee = tokio::spawn(async move {
        let (mut stream, _) = socket.accept().await?;
        stream
            .write_all(b"Type: connect\r\nV8-Version: 5.1.281.103\r\nProtocol-Version: 1\r\nEmbedding-Host: node v6.11.0\r\nContent-Length: 0\r\n\r\n")
            .await?;
        stream
            .write_all(&frame_message(&json!({
                "seq": 1,
                "type": "event",
                "event": "break",
                "body": {
                    "sourceLine": 0,
                    "sourceColumn": 62,
                    "script": {"id": 41, "name": "/srv/app.js"}
                }
            })))
            .await?;
        stream
            .write_all(&frame_message(&json!({"type": "output", "output": "ready\n"})))
            .await?;

        let (mut reader, mut writer) = split(stream);
        let request = loop {
            match reader.next().await {
                Some(Ok(Message::Request(request))) => break request,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => eyre::bail!("client went away"),
            }
        };
        writer
            .send(OutgoingMessage::Response(Response {
                seq: 2,
                request_seq: Some(request.seq),
                command: Some(request.command.clone()),
                success: true,
                running: true,
                ..Default::default()
            }))
            .await?;
        Ok::<_, eyre::Report>(request)
    });

    let (session, mut events) = DebugSession::attach(addr, SessionConfig::default()).await?;
    assert_eq!(session.listener().map(|l| l.port()), Some(addr.port()));

    assert_eq!(next_event(&mut events).await, Event::Connected);
    match next_event(&mut events).await {
        Event::Break {
            location,
            breakpoints,
        } => {
            assert!(breakpoints.is_empty());
            assert_eq!((location.line, location.column), (0, 0));
            assert_eq!(location.module.map(|m| m.name), Some("/srv/app.js".to_string()));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match next_event(&mut events).await {
        Event::Output { text, stream, .. } => {
            assert_eq!(text, "ready\n");
            assert_eq!(stream, OutputStream::Stdout);
        }
        other => panic!("unexpected event {other:?}"),
    }

    session.step(SteppingKind::Over).await?;
    let request = debuggee.await??;
    assert_eq!(request.command, "continue");
    assert_eq!(
        request.arguments.as_ref().and_then(|a| a.get("stepaction")),
        Some(&json!("next"))
    );

    assert_eq!(next_event(&mut events).await, Event::Disconnected);
    let err = session.resume().await.unwrap_err();
    assert!(err.is_fatal());
    Ok(())
}

#[tokio::test]
async fn attach_gives_up_after_timeout() {
    let port = transport::get_random_tcp_port().unwrap();
    let config = SessionConfig {
        attach_timeout: Duration::from_millis(300),
        ..Default::default()
    };
    let result = DebugSession::attach(([127, 0, 0, 1], port).into(), config).await;
    let err = result.err().expect("attach should fail");
    assert!(err.is_fatal());
}
