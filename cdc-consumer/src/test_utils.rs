//! In-memory stand-ins for the broker session, the record sink and the operational log.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use serde_json::Value;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::log_entry::LogEntry;
use crate::session::{BrokerSession, RawMessage, SessionError};
use crate::sink::{render, LogSink};

pub fn message(topic: &str, partition: i32, offset: i64, payload: Option<&[u8]>) -> RawMessage {
    RawMessage {
        topic: topic.to_string(),
        partition,
        offset,
        payload: payload.map(<[u8]>::to_vec),
    }
}

/// The error every scripted broker failure reports.
pub fn brokers_down() -> SessionError {
    SessionError::Kafka(KafkaError::MetadataFetch(RDKafkaErrorCode::AllBrokersDown))
}

#[derive(Default)]
struct MockState {
    connect_failures: u32,
    connect_attempts: u32,
    subscribed: Vec<String>,
    disconnects: u32,
    fail_disconnect: bool,
    hang_on_disconnect: bool,
    messages: VecDeque<Result<RawMessage, SessionError>>,
    hang_when_drained: bool,
}

/// A scripted [`BrokerSession`]. Clones share state, so a test can keep a handle for inspection
/// after handing the session to a `ConnectionManager`.
#[derive(Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` connection attempts fail.
    pub fn failing_connects(self, n: u32) -> Self {
        self.state.lock().connect_failures = n;
        self
    }

    pub fn with_message(self, message: RawMessage) -> Self {
        self.state.lock().messages.push_back(Ok(message));
        self
    }

    pub fn with_error(self, error: SessionError) -> Self {
        self.state.lock().messages.push_back(Err(error));
        self
    }

    /// Once the queue is empty, block like an idle broker instead of ending the stream.
    pub fn hang_when_drained(self) -> Self {
        self.state.lock().hang_when_drained = true;
        self
    }

    pub fn failing_disconnect(self) -> Self {
        self.state.lock().fail_disconnect = true;
        self
    }

    pub fn hanging_disconnect(self) -> Self {
        self.state.lock().hang_on_disconnect = true;
        self
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().connect_attempts
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.state.lock().subscribed.clone()
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().disconnects
    }
}

#[async_trait]
impl BrokerSession for MockSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(brokers_down());
        }
        Ok(())
    }

    async fn subscribe(&mut self, topics: &[&str]) -> Result<(), SessionError> {
        self.state.lock().subscribed = topics.iter().map(|t| t.to_string()).collect();
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<RawMessage, SessionError>> {
        let (next, hang) = {
            let mut state = self.state.lock();
            (state.messages.pop_front(), state.hang_when_drained)
        };

        match next {
            Some(next) => Some(next),
            None if hang => std::future::pending().await,
            None => None,
        }
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        let (fail, hang) = {
            let mut state = self.state.lock();
            state.disconnects += 1;
            (state.fail_disconnect, state.hang_on_disconnect)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(brokers_down());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Collects rendered records, tagged with the stream `StdioSink` would have written them to.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Stream, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Stream, Value)> {
        self.records.lock().clone()
    }

    pub fn stream(&self, stream: Stream) -> Vec<Value> {
        self.records
            .lock()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, entry: &LogEntry) -> io::Result<()> {
        let record: Value = serde_json::from_str(&render(entry)?)?;
        let stream = if entry.is_error() {
            Stream::Stderr
        } else {
            Stream::Stdout
        };
        self.records.lock().push((stream, record));
        Ok(())
    }
}

/// A sink whose output has gone away.
pub struct FailingSink;

impl LogSink for FailingSink {
    fn emit(&self, _entry: &LogEntry) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }
}

/// Collects the operational log as the JSON lines the service writes in production.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: self.buffer.clone(),
        }
    }
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes this thread's events into the capture until the guard is dropped. Only works with
    /// the current-thread runtime, where every task runs on the test's thread.
    pub fn set_default(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::DEBUG)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<Value> {
        let buffer = self.buffer.lock();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Messages logged at `level` (`"INFO"`, `"WARN"`, ...), in order.
    pub fn messages(&self, level: &str) -> Vec<String> {
        self.lines()
            .iter()
            .filter(|line| line["level"] == level)
            .filter_map(|line| line["fields"]["message"].as_str().map(str::to_string))
            .collect()
    }
}
