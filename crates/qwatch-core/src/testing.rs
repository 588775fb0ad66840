// ── In-memory device for tests ──
//
// A scriptable stand-in for a RouterOS device. Clones share state, so a
// test keeps one handle to flip failure switches while the session owns
// another as its connector.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use qwatch_api::{Record, TransportConfig};

use crate::config::{Credentials, DeviceEndpoint};
use crate::session::{Connector, DeviceConnection, IDENTITY_PRINT, QUEUE_TREE_PRINT};

#[derive(Default)]
struct FakeState {
    unreachable: AtomicBool,
    queues: Mutex<Vec<Record>>,
    query_trap: Mutex<Option<String>>,
    connects: AtomicUsize,
    queries: AtomicUsize,
    closes: AtomicUsize,
}

/// Fake device acting as its own [`Connector`].
#[derive(Clone, Default)]
pub struct FakeDevice {
    state: Arc<FakeState>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// When unreachable, new connects are refused and open connections
    /// fail with a closed stream.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Replace the queue table with `(name, rate, max-limit)` rows.
    pub fn set_queues(&self, rows: &[(&str, &str, &str)]) {
        let records: Vec<Record> = rows
            .iter()
            .map(|&(name, rate, max_limit)| {
                [
                    ("name", name),
                    ("rate", rate),
                    ("max-limit", max_limit),
                    ("limit-at", "0"),
                    ("bytes", "1000"),
                    ("packets", "10"),
                ]
                .into_iter()
                .collect::<Record>()
            })
            .collect();
        self.set_records(records);
    }

    pub fn set_records(&self, records: Vec<Record>) {
        *self
            .state
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = records;
    }

    /// Make the queue query fail with a `!trap` carrying `message`.
    pub fn set_query_trap(&self, message: Option<&str>) {
        *self
            .state
            .query_trap
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message.map(str::to_owned);
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.state.queries.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

impl Connector for FakeDevice {
    type Conn = FakeConnection;

    async fn connect(
        &self,
        endpoint: &DeviceEndpoint,
        _credentials: &Credentials,
        _transport: TransportConfig,
    ) -> Result<FakeConnection, qwatch_api::Error> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(qwatch_api::Error::Connect {
                address: endpoint.address(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeConnection {
    state: Arc<FakeState>,
}

impl DeviceConnection for FakeConnection {
    async fn run(
        &mut self,
        command: &str,
        _params: &[&str],
    ) -> Result<Vec<Record>, qwatch_api::Error> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(qwatch_api::Error::ConnectionClosed);
        }

        match command {
            IDENTITY_PRINT => Ok(vec![[("name", "fake")].into_iter().collect::<Record>()]),
            QUEUE_TREE_PRINT => {
                self.state.queries.fetch_add(1, Ordering::SeqCst);
                let trap = self
                    .state
                    .query_trap
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match trap {
                    Some(message) => Err(qwatch_api::Error::Trap { message }),
                    None => Ok(self
                        .state
                        .queues
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone()),
                }
            }
            other => Err(qwatch_api::Error::Trap {
                message: format!("no such command: {other}"),
            }),
        }
    }

    async fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
