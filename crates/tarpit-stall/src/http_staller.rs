//! Per-connection byte-paced writer, grounded on `http/stall/stall.go`'s
//! `HttpStaller`. The protocol-specific plumbing (fiber's body-stream
//! writer) is gone -- this takes any `AsyncWrite` -- but the pacing
//! loop, the deregister-on-halt handshake, and the literal `\n`
//! escape hatch are carried over unchanged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{interval, Instant, MissedTickBehavior};

use tarpit_generator::ContentSource;

use crate::{StallError, Staller, StallerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    TimedOut,
    Closed,
    Evicted,
}

/// Reports wasted attacker time back to telemetry. `tarpit-telemetry`
/// implements this; `tarpit-stall` only needs the contract, so this
/// crate never depends on the telemetry crate directly.
pub trait WastedTimeSink: Send + Sync {
    fn report_wasted_time(&self, duration: Duration);
}

pub struct NullWastedTimeSink;
impl WastedTimeSink for NullWastedTimeSink {
    fn report_wasted_time(&self, _duration: Duration) {}
}

pub struct HttpStallerOptions {
    pub ip_address: String,
    pub connection_id: u64,
    pub transfer_rate: Duration,
    pub report_interval: Duration,
    pub generator: Box<dyn ContentSource>,
    pub wasted_time_sink: Arc<dyn WastedTimeSink>,
}

pub struct HttpStaller {
    ip_address: String,
    connection_id: u64,
    transfer_rate: Duration,
    report_interval: Duration,
    generator: AsyncMutex<Box<dyn ContentSource>>,
    wasted_time_sink: Arc<dyn WastedTimeSink>,
    state: Mutex<State>,
    running: AtomicBool,
    deregister_tx: Mutex<Option<UnboundedSender<StallerHandle>>>,
}

impl HttpStaller {
    pub fn new(opts: HttpStallerOptions) -> Arc<Self> {
        Arc::new(Self {
            ip_address: opts.ip_address,
            connection_id: opts.connection_id,
            transfer_rate: opts.transfer_rate,
            report_interval: opts.report_interval,
            generator: AsyncMutex::new(opts.generator),
            wasted_time_sink: opts.wasted_time_sink,
            state: Mutex::new(State::Idle),
            running: AtomicBool::new(true),
            deregister_tx: Mutex::new(None),
        })
    }

    pub fn bind_to_pool(&self, tx: UnboundedSender<StallerHandle>) {
        *self.deregister_tx.lock().expect("staller lock poisoned") = Some(tx);
    }

    fn set_state(&self, state: State) {
        *self.state.lock().expect("staller lock poisoned") = state;
    }

    fn is_terminal(&self) -> bool {
        !matches!(*self.state.lock().expect("staller lock poisoned"), State::Idle | State::Running)
    }

    /// Runs the stall loop until the deadline elapses, the sink
    /// errors, or the staller is evicted. `self` must be the same
    /// `Arc` registered with a [`crate::StallerPool`] so halting can
    /// hand itself back through the deregister channel.
    pub async fn run<W>(self: &Arc<Self>, mut writer: W, deadline: Duration) -> Result<(), StallError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.set_state(State::Running);
        let started_at = Instant::now();
        let deadline_at = started_at + deadline;

        let mut ticker = interval(self.transfer_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report_ticker = interval(self.report_interval);
        report_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_report = started_at;

        let start_bytes = {
            let mut generator = self.generator.lock().await;
            generator.start()
        };

        if !self
            .write_paced(&mut writer, &mut ticker, &mut report_ticker, &mut last_report, deadline_at, &start_bytes)
            .await?
        {
            self.halt_timed_out(&mut writer).await;
            return Ok(());
        }

        loop {
            if !self.running.load(Ordering::Acquire) {
                self.halt_evicted(&mut writer).await;
                return Ok(());
            }

            if Instant::now() >= deadline_at {
                self.halt_timed_out(&mut writer).await;
                return Ok(());
            }

            let (chunk, separator) = {
                let mut generator = self.generator.lock().await;
                (generator.generate_chunk(), generator.chunk_separator())
            };

            let continued = self
                .write_paced(&mut writer, &mut ticker, &mut report_ticker, &mut last_report, deadline_at, &chunk)
                .await?;

            if !continued {
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.halt_timed_out(&mut writer).await;
                return Ok(());
            }

            let _ = self
                .write_paced(&mut writer, &mut ticker, &mut report_ticker, &mut last_report, deadline_at, &separator)
                .await?;
        }
    }

    /// Writes `data` one byte at a time, pacing on `ticker`. Returns
    /// `Ok(true)` if the whole buffer was written, `Ok(false)` if the
    /// deadline elapsed or the staller was evicted mid-write -- in
    /// which case the remainder is flushed best-effort first, per the
    /// "flush what's left, then stop" contract in spec.md section 4.3.
    async fn write_paced<W>(
        &self,
        writer: &mut W,
        ticker: &mut tokio::time::Interval,
        report_ticker: &mut tokio::time::Interval,
        last_report: &mut Instant,
        deadline_at: Instant,
        data: &[u8],
    ) -> Result<bool, StallError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut i = 0;
        while i < data.len() {
            if Instant::now() >= deadline_at || !self.running.load(Ordering::Acquire) {
                writer.write_all(&data[i..]).await?;
                writer.flush().await?;
                return Ok(false);
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = report_ticker.tick() => {
                    self.report_wasted_time(last_report);
                    continue;
                }
            }

            if !self.running.load(Ordering::Acquire) {
                writer.write_all(&data[i..]).await?;
                writer.flush().await?;
                return Ok(false);
            }

            // Preserve a literal two-byte "\n" escape sequence as a single
            // paced unit, so JSON-embedded newline escapes in generator
            // output stay syntactically intact.
            let advance = if data[i] == b'\\' && data.get(i + 1) == Some(&b'n') { 2 } else { 1 };
            writer.write_all(&data[i..i + advance]).await?;
            writer.flush().await?;
            i += advance;
        }
        Ok(true)
    }

    fn report_wasted_time(&self, last_report: &mut Instant) {
        let now = Instant::now();
        self.wasted_time_sink.report_wasted_time(now.duration_since(*last_report));
        *last_report = now;
    }

    async fn halt_timed_out<W: AsyncWrite + Unpin>(self: &Arc<Self>, writer: &mut W) {
        self.set_state(State::TimedOut);
        let generator_end = {
            let mut generator = self.generator.lock().await;
            generator.end()
        };
        let _ = writer.write_all(&generator_end).await;
        let _ = writer.flush().await;
        self.fire_terminal_callback("onTimeout");
        self.close_internal();
    }

    async fn halt_evicted<W: AsyncWrite + Unpin>(self: &Arc<Self>, writer: &mut W) {
        self.set_state(State::Evicted);
        let _ = writer.shutdown().await;
        self.fire_terminal_callback("onClose");
        self.close_internal();
    }

    fn fire_terminal_callback(self: &Arc<Self>, event: &'static str) {
        let staller: StallerHandle = self.clone();
        tokio::spawn(async move {
            tracing::debug!(group = staller.group_identifier(), id = staller.identifier(), event, "staller terminal event");
        });
    }

    fn close_internal(self: &Arc<Self>) {
        debug_assert!(self.is_terminal());
        if let Some(tx) = self.deregister_tx.lock().expect("staller lock poisoned").as_ref() {
            let _ = tx.send(self.clone());
        }
    }
}

impl Staller for HttpStaller {
    fn group_identifier(&self) -> &str {
        &self.ip_address
    }

    fn identifier(&self) -> u64 {
        self.connection_id
    }

    /// Idempotent: flips the running flag so the write loop halts on
    /// its next check. Closing an already-closed staller is a no-op.
    fn close(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            self.set_state(State::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    struct CountingSource {
        calls: u32,
    }

    impl ContentSource for CountingSource {
        fn start(&mut self) -> Vec<u8> {
            b"start".to_vec()
        }
        fn generate(&mut self) -> Vec<u8> {
            self.generate_chunk()
        }
        fn generate_chunk(&mut self) -> Vec<u8> {
            self.calls += 1;
            b"chunk".to_vec()
        }
        fn chunk_separator(&self) -> Vec<u8> {
            b"\\n".to_vec()
        }
        fn end(&mut self) -> Vec<u8> {
            b"end".to_vec()
        }
        fn content_type(&self) -> &'static str {
            "text/plain"
        }
    }

    #[tokio::test]
    async fn halts_at_deadline_and_writes_end() {
        let (client, mut server) = duplex(4096);

        // Drain the server side concurrently so the staller's writes never
        // block on a full pipe.
        let drain = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            loop {
                match tokio::io::AsyncReadExt::read(&mut server, &mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
            }
        });

        let staller = HttpStaller::new(HttpStallerOptions {
            ip_address: "1.2.3.4".to_string(),
            connection_id: 7,
            transfer_rate: Duration::from_millis(1),
            report_interval: Duration::from_secs(30),
            generator: Box::new(CountingSource { calls: 0 }),
            wasted_time_sink: Arc::new(NullWastedTimeSink),
        });

        tokio::time::timeout(Duration::from_secs(2), staller.run(client, Duration::from_millis(20)))
            .await
            .expect("staller should halt once its deadline elapses")
            .unwrap();

        drain.abort();
    }
}
