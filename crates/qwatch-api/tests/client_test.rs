#![allow(clippy::unwrap_used)]
// Integration tests for `RouterOsClient` against a scripted fake device.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use qwatch_api::proto::{Sentence, SentenceCodec};
use qwatch_api::{Error, RouterOsClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

type Device<S> = Framed<S, SentenceCodec>;

fn words(ws: &[&str]) -> Sentence {
    ws.iter().map(|w| (*w).to_owned()).collect()
}

fn pair() -> (RouterOsClient<DuplexStream>, Device<DuplexStream>) {
    let (client_io, device_io) = tokio::io::duplex(4096);
    let client = RouterOsClient::from_stream(client_io, "duplex", TransportConfig::default());
    (client, Framed::new(device_io, SentenceCodec::default()))
}

async fn expect<S>(device: &mut Device<S>, expected: &[&str])
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let got = device.next().await.unwrap().unwrap();
    assert_eq!(got, words(expected));
}

async fn reply<S>(device: &mut Device<S>, sentences: &[&[&str]])
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    for s in sentences {
        device.send(words(s)).await.unwrap();
    }
}

/// Raw sentence bytes, for words that are not valid UTF-8. Words must be
/// shorter than 0x80 bytes.
fn raw_sentence(buf: &mut Vec<u8>, words: &[&[u8]]) {
    for word in words {
        buf.push(u8::try_from(word.len()).unwrap());
        buf.extend_from_slice(word);
    }
    buf.push(0);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_collects_records_in_order() {
    let (mut client, mut device) = pair();

    let fake = tokio::spawn(async move {
        expect(&mut device, &["/queue/tree/print", "=stats"]).await;
        reply(
            &mut device,
            &[
                &["!re", "=name=A_OUT", "=rate=5000000", "=max-limit=10M"],
                &["!re", "=name=B_IN", "=rate=19000000", "=max-limit=20M"],
                &["!done"],
            ],
        )
        .await;
        device
    });

    let records = client.run("/queue/tree/print", &["=stats"]).await.unwrap();
    fake.await.unwrap();

    let names: Vec<_> = records.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, ["A_OUT", "B_IN"]);
    assert_eq!(records[1].get("max-limit"), Some("20M"));
}

#[tokio::test]
async fn test_non_utf8_word_does_not_fail_the_reply() {
    let (mut client, mut device) = pair();

    let fake = tokio::spawn(async move {
        expect(&mut device, &["/queue/tree/print", "=stats"]).await;

        let mut raw = Vec::new();
        raw_sentence(&mut raw, &[b"!re", b"=name=A_OUT", b"=rate=5M"]);
        raw_sentence(&mut raw, &[b"!re", b"=name=B_IN", b"=comment=caf\xe9"]);
        raw_sentence(&mut raw, &[b"!done"]);
        device.get_mut().write_all(&raw).await.unwrap();

        expect(&mut device, &["/system/identity/print"]).await;
        reply(&mut device, &[&["!re", "=name=MikroTik"], &["!done"]]).await;
        device
    });

    let records = client.run("/queue/tree/print", &["=stats"]).await.unwrap();
    let names: Vec<_> = records.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, ["A_OUT", "B_IN"]);
    assert_eq!(records[1].get("comment"), Some("caf\u{fffd}"));

    // The session is still in sync afterwards.
    let identity = client.run("/system/identity/print", &[]).await.unwrap();
    assert_eq!(identity[0].get("name"), Some("MikroTik"));
    fake.await.unwrap();
}

#[tokio::test]
async fn test_trap_keeps_session_usable() {
    let (mut client, mut device) = pair();

    let fake = tokio::spawn(async move {
        expect(&mut device, &["/bogus"]).await;
        reply(
            &mut device,
            &[&["!trap", "=message=no such command"], &["!done"]],
        )
        .await;

        expect(&mut device, &["/system/identity/print"]).await;
        reply(&mut device, &[&["!re", "=name=MikroTik"], &["!done"]]).await;
        device
    });

    let err = client.run("/bogus", &[]).await.unwrap_err();
    assert!(
        matches!(&err, Error::Trap { message } if message == "no such command"),
        "got {err:?}"
    );
    assert!(!err.is_connection_lost());

    let identity = client.run("/system/identity/print", &[]).await.unwrap();
    assert_eq!(identity[0].get("name"), Some("MikroTik"));
    fake.await.unwrap();
}

#[tokio::test]
async fn test_fatal_reply() {
    let (mut client, mut device) = pair();

    tokio::spawn(async move {
        expect(&mut device, &["/queue/tree/print"]).await;
        reply(&mut device, &[&["!fatal", "session terminated on request"]]).await;
        device
    });

    let err = client.run("/queue/tree/print", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Fatal { .. }), "got {err:?}");
    assert!(err.is_connection_lost());
}

#[tokio::test]
async fn test_stream_closed_mid_reply() {
    let (mut client, mut device) = pair();

    tokio::spawn(async move {
        expect(&mut device, &["/queue/tree/print"]).await;
        reply(&mut device, &[&["!re", "=name=A_OUT"]]).await;
        drop(device);
    });

    let err = client.run("/queue/tree/print", &[]).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn test_command_timeout() {
    let (client_io, device_io) = tokio::io::duplex(4096);
    let transport = TransportConfig {
        connect_timeout: Duration::from_secs(1),
        command_timeout: Duration::from_secs(3),
    };
    let mut client = RouterOsClient::from_stream(client_io, "duplex", transport);
    let mut device = Framed::new(device_io, SentenceCodec::default());

    let fake = tokio::spawn(async move {
        expect(&mut device, &["/queue/tree/print"]).await;
        // Never answer; hold the stream open.
        tokio::time::sleep(Duration::from_secs(60)).await;
        device
    });

    let err = client.run("/queue/tree/print", &[]).await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout_secs: 3 }),
        "got {err:?}"
    );
    fake.abort();
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_trap_is_authentication_failure() {
    let (mut client, mut device) = pair();

    tokio::spawn(async move {
        expect(&mut device, &["/login", "=name=admin", "=password=wrong"]).await;
        reply(
            &mut device,
            &[&["!trap", "=message=invalid user name or password (6)"], &["!done"]],
        )
        .await;
        device
    });

    let err = client
        .login("admin", &SecretString::from("wrong"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, Error::Authentication { message } if message.contains("invalid user")),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_connect_over_tcp_logs_in() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut device = Framed::new(socket, SentenceCodec::default());
        expect(&mut device, &["/login", "=name=admin", "=password=password"]).await;
        reply(&mut device, &[&["!done"]]).await;
        expect(&mut device, &["/system/identity/print"]).await;
        reply(&mut device, &[&["!re", "=name=edge"], &["!done"]]).await;
    });

    let mut client = RouterOsClient::connect(
        &address,
        "admin",
        &SecretString::from("password"),
        TransportConfig::default(),
    )
    .await
    .unwrap();

    let identity = client.run("/system/identity/print", &[]).await.unwrap();
    assert_eq!(identity[0].get("name"), Some("edge"));
    client.close().await;
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port with nothing listening.
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };

    let result = RouterOsClient::connect(
        &address,
        "admin",
        &SecretString::from("password"),
        TransportConfig::default(),
    )
    .await;

    let Err(err) = result else {
        panic!("expected connect failure");
    };
    assert!(matches!(err, Error::Connect { .. }), "got {err:?}");
}
