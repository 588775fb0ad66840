// RouterOS API client
//
// Wraps a byte stream (TCP in production, an in-memory duplex in tests)
// in the sentence codec. One command is in flight at a time: `run` writes
// a sentence and reads replies until `!done`.

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::error::Error;
use crate::proto::{Reply, Sentence, SentenceCodec};
use crate::record::Record;
use crate::transport::{TransportConfig, with_timeout};

/// Outcome of one command: every `!re` record plus the `!done` attributes.
struct Completed {
    records: Vec<Record>,
    done: Record,
}

/// Authenticated RouterOS API session.
///
/// Generic over the underlying stream so tests can drive it with
/// [`tokio::io::duplex`].
pub struct RouterOsClient<S = TcpStream> {
    framed: Framed<S, SentenceCodec>,
    transport: TransportConfig,
    address: String,
}

impl RouterOsClient<TcpStream> {
    /// Open a TCP connection to `address` (`host:port`) and log in.
    ///
    /// The TCP connect and the login exchange share `transport.connect_timeout`.
    pub async fn connect(
        address: &str,
        username: &str,
        password: &SecretString,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        with_timeout(transport.connect_timeout, async {
            let stream = TcpStream::connect(address)
                .await
                .map_err(|source| Error::Connect {
                    address: address.to_owned(),
                    source,
                })?;
            stream.set_nodelay(true)?;

            let mut client = Self::from_stream(stream, address, transport);
            client.login(username, password).await?;
            Ok(client)
        })
        .await
    }
}

impl<S> RouterOsClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-open stream. No login is performed.
    pub fn from_stream(stream: S, address: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            framed: Framed::new(stream, SentenceCodec::default()),
            transport,
            address: address.into(),
        }
    }


    /// Post-6.43 plaintext login (`/login =name= =password=`).
    ///
    /// A `!done` carrying `=ret=` means the device wants the legacy MD5
    /// challenge, which is reported as an authentication failure.
    pub async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), Error> {
        let sentence = vec![
            "/login".to_owned(),
            format!("=name={username}"),
            format!("=password={}", password.expose_secret()),
        ];

        match self.execute(sentence).await {
            Ok(Completed { done, .. }) if done.get("ret").is_some() => Err(Error::Authentication {
                message: "device requested legacy challenge login, which is not supported".into(),
            }),
            Ok(_) => {
                debug!(address = %self.address, username, "logged in to RouterOS API");
                Ok(())
            }
            Err(Error::Trap { message }) => Err(Error::Authentication { message }),
            Err(e) => Err(e),
        }
    }

    /// Run a command and collect its `!re` records in device order.
    ///
    /// `params` are sent verbatim after the command word, e.g. `"=stats"`
    /// or `"?name=ether1"`.
    pub async fn run(&mut self, command: &str, params: &[&str]) -> Result<Vec<Record>, Error> {
        let mut sentence = Vec::with_capacity(params.len() + 1);
        sentence.push(command.to_owned());
        sentence.extend(params.iter().map(|&p| p.to_owned()));

        let limit = self.transport.command_timeout;
        let completed = with_timeout(limit, self.execute(sentence)).await?;
        debug!(command, records = completed.records.len(), "command completed");
        Ok(completed.records)
    }

    /// Shut down the write half. Errors are ignored; the session is gone
    /// either way.
    pub async fn close(&mut self) {
        let _ = self.framed.get_mut().shutdown().await;
    }

    async fn execute(&mut self, sentence: Sentence) -> Result<Completed, Error> {
        self.framed.send(sentence).await?;

        let mut records = Vec::new();
        let mut trap = None;

        loop {
            let sentence = self.framed.next().await.ok_or(Error::ConnectionClosed)??;
            match Reply::parse(sentence)? {
                Reply::Re(record) => records.push(record),
                Reply::Trap(record) => {
                    // Keep reading: the device still sends `!done`.
                    trap = Some(record.get("message").unwrap_or("unknown error").to_owned());
                }
                Reply::Done(done) => {
                    return match trap {
                        Some(message) => Err(Error::Trap { message }),
                        None => Ok(Completed { records, done }),
                    };
                }
                Reply::Fatal(message) => return Err(Error::Fatal { message }),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::BytesMut;
    use tokio_util::codec::Encoder;

    use super::*;

    fn wire(sentences: &[&[&str]]) -> Vec<u8> {
        let mut codec = SentenceCodec::default();
        let mut buf = BytesMut::new();
        for words in sentences {
            let sentence = words.iter().map(|w| (*w).to_owned()).collect();
            codec.encode(sentence, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn login_writes_exact_sentence() {
        let mock = tokio_test::io::Builder::new()
            .write(&wire(&[&["/login", "=name=admin", "=password=hunter2"]]))
            .read(&wire(&[&["!done"]]))
            .build();

        let mut client = RouterOsClient::from_stream(mock, "mock", TransportConfig::default());
        client
            .login("admin", &SecretString::from("hunter2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn legacy_challenge_is_rejected() {
        let mock = tokio_test::io::Builder::new()
            .write(&wire(&[&["/login", "=name=admin", "=password=x"]]))
            .read(&wire(&[&["!done", "=ret=93b438ec9b80057c06dd9fe67d56aa9a"]]))
            .build();

        let mut client = RouterOsClient::from_stream(mock, "mock", TransportConfig::default());
        let err = client
            .login("admin", &SecretString::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
    }
}
