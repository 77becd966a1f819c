//! # Bridge Runtime
//!
//! Drives one bridge on tokio. The three execution contexts of the firmware
//! become three tasks plus a writer for the wired link:
//!
//! ```text
//!  TCP read ──► wired-in ring ──► tick task (BridgeTick, Housekeeping) ──► UDP
//!  TCP write ◄── wired-out ring ◄── medium task (CaptureAdapter) ◄──────── UDP
//! ```
//!
//! The rings are leaked so their halves can move into `'static` tasks; each
//! bridge costs two small allocations for the life of the process.

use std::io;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use radio_core::port::{flush_outbound, HW_FIFO_DEPTH};
use radio_core::ring::{Consumer, Producer};
use radio_core::{
    BridgeTick, Channel, FramerStats, HeartbeatReport, Housekeeping, LinkError, LinkState,
    RingChannel, TickOutcome, Transmitter, WiredRxChannel, WiredStats, WiredTxChannel,
    WIRED_RX_BUFFER_SIZE, WIRED_TX_BUFFER_SIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HostConfig;
use crate::diagnostics::{LogDiagnostics, LogIndicator};
use crate::error::{HostError, Result};
use crate::medium::{
    own_source_addr, recv_datagram, CaptureAdapter, UdpMedium, MAX_DATAGRAM_LEN,
};

/// Requests handled on the tick task, which owns the radio
enum Command {
    SetChannel(u8, oneshot::Sender<Result<()>>),
}

/// Owner's view of a running bridge
pub struct BridgeHandle {
    state: Arc<LinkState>,
    wired_rx: &'static WiredRxChannel,
    wired_tx: &'static WiredTxChannel,
    framer: watch::Receiver<FramerStats>,
    heartbeat: watch::Receiver<Option<HeartbeatReport>>,
    commands: mpsc::Sender<Command>,
    medium_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeHandle {
    /// Current counters
    pub fn stats(&self) -> HeartbeatReport {
        HeartbeatReport::new(
            self.state.snapshot(),
            wired_stats(self.wired_rx, self.wired_tx),
            *self.framer.borrow(),
            None,
        )
    }

    /// Current counters as JSON
    pub fn stats_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.stats())?)
    }

    /// Most recent heartbeat, if one has been emitted
    pub fn last_heartbeat(&self) -> Option<HeartbeatReport> {
        *self.heartbeat.borrow()
    }

    /// Zero the link and ring overflow counters
    pub fn reset_stats(&self) {
        self.state.reset_stats();
        self.wired_rx.reset_overflow_count();
        self.wired_tx.reset_overflow_count();
    }

    /// Retune the radio
    pub async fn set_channel(&self, number: u8) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SetChannel(number, reply))
            .await
            .map_err(|_| HostError::Stopped)?;
        rx.await.map_err(|_| HostError::Stopped)?
    }

    /// Local address of the medium socket
    pub fn medium_addr(&self) -> SocketAddr {
        self.medium_addr
    }

    /// True once every task has stopped
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }

    /// Stop all tasks
    pub fn shutdown(self) {
        info!("bridge: shutting down");
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Bind the medium socket from `config` and start a bridge on `wired`
pub async fn spawn_bridge(config: HostConfig, wired: TcpStream) -> Result<BridgeHandle> {
    let medium = StdUdpSocket::bind(config.medium_bind)?;
    spawn_bridge_on(config, wired, medium).await
}

/// Start a bridge on an already bound medium socket
///
/// `config.medium_bind` is ignored.
pub async fn spawn_bridge_on(
    config: HostConfig,
    wired: TcpStream,
    medium: StdUdpSocket,
) -> Result<BridgeHandle> {
    config.bridge.validate()?;
    wired.set_nodelay(true)?;

    let state = Arc::new(LinkState::new());
    let (wired_in, wired_in_rx) = leak_ring::<WIRED_RX_BUFFER_SIZE>();
    let (wired_out_tx, wired_out) = leak_ring::<WIRED_TX_BUFFER_SIZE>();
    let wired_rx = wired_in.channel();
    let wired_tx = wired_out_tx.channel();

    medium.set_nonblocking(true)?;
    let medium_addr = medium.local_addr()?;
    let own_addr = own_source_addr(&medium, config.medium_peer)?;
    let radio = UdpMedium::new(
        medium.try_clone()?,
        config.medium_peer,
        config.mac_address,
        config.bridge.channel,
        state.clone(),
    )?;
    let medium_rx = UdpSocket::from_std(medium)?;

    let (framer_tx, framer) = watch::channel(FramerStats::default());
    let (channel_tx, channel_rx) = watch::channel(config.bridge.channel);
    let (diagnostics, heartbeat) = LogDiagnostics::new();
    let (commands, command_rx) = mpsc::channel(4);
    let outbound = Arc::new(Notify::new());

    let (reader, writer) = wired.into_split();
    let tasks = vec![
        tokio::spawn(wired_read_task(reader, wired_in)),
        tokio::spawn(wired_write_task(writer, wired_out, outbound.clone())),
        tokio::spawn(tick_task(TickContext {
            config: config.clone(),
            tx: Transmitter::new(radio, config.bridge.rendezvous_tag),
            state: state.clone(),
            wired_in: wired_in_rx,
            wired_rx,
            wired_tx,
            framer: framer_tx,
            channel: channel_tx,
            diagnostics,
            commands: command_rx,
        })),
        tokio::spawn(medium_task(
            medium_rx,
            own_addr,
            CaptureAdapter::new(config.bridge.rendezvous_tag, config.bridge.channel),
            state.clone(),
            wired_out_tx,
            channel_rx,
            outbound,
        )),
    ];

    info!(
        "bridge v{} up: medium {} -> {}, channel {}",
        radio_core::VERSION,
        medium_addr,
        config.medium_peer,
        config.bridge.channel.get()
    );

    Ok(BridgeHandle {
        state,
        wired_rx,
        wired_tx,
        framer,
        heartbeat,
        commands,
        medium_addr,
        tasks,
    })
}

fn leak_ring<const N: usize>() -> (Producer<'static, N>, Consumer<'static, N>) {
    Box::leak(Box::new(RingChannel::<N>::new())).split()
}

fn wired_stats(rx: &WiredRxChannel, tx: &WiredTxChannel) -> WiredStats {
    WiredStats {
        rx_overflow: rx.overflow_count(),
        tx_overflow: tx.overflow_count(),
    }
}

/// Wired link receive: TCP bytes into the wired-in ring, lossy
async fn wired_read_task(
    mut reader: OwnedReadHalf,
    mut wired_in: Producer<'static, WIRED_RX_BUFFER_SIZE>,
) {
    let mut chunk = [0u8; HW_FIFO_DEPTH];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                info!("wired: peer closed");
                break;
            }
            Ok(n) => {
                let stored = wired_in.write(&chunk[..n]);
                if stored < n {
                    debug!("wired: dropped {} bytes", n - stored);
                }
            }
            Err(e) => {
                warn!("wired: read failed: {}", e);
                break;
            }
        }
    }
}

/// TCP write half as an async UART
struct WiredWriter(OwnedWriteHalf);

impl embedded_io_async::ErrorType for WiredWriter {
    type Error = io::Error;
}

impl embedded_io_async::Write for WiredWriter {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        AsyncWriteExt::write(&mut self.0, buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        AsyncWriteExt::flush(&mut self.0).await
    }
}

/// Wired link transmit: drain the wired-out ring whenever a frame lands
async fn wired_write_task(
    writer: OwnedWriteHalf,
    mut wired_out: Consumer<'static, WIRED_TX_BUFFER_SIZE>,
    outbound: Arc<Notify>,
) {
    let mut writer = WiredWriter(writer);
    loop {
        outbound.notified().await;
        if let Err(e) = flush_outbound(&mut writer, &mut wired_out).await {
            warn!("wired: write failed: {}", e);
            break;
        }
    }
}

struct TickContext {
    config: HostConfig,
    tx: Transmitter<UdpMedium>,
    state: Arc<LinkState>,
    wired_in: Consumer<'static, WIRED_RX_BUFFER_SIZE>,
    wired_rx: &'static WiredRxChannel,
    wired_tx: &'static WiredTxChannel,
    framer: watch::Sender<FramerStats>,
    channel: watch::Sender<Channel>,
    diagnostics: LogDiagnostics,
    commands: mpsc::Receiver<Command>,
}

/// Periodic context: one bridge tick and housekeeping per period
async fn tick_task(mut ctx: TickContext) {
    let period = Duration::from_millis(u64::from(ctx.config.bridge.tick_period_ms));
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut bridge = BridgeTick::new();
    let mut housekeeping = Housekeeping::new(&ctx.config.bridge);
    let mut led = LogIndicator::default();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let TickOutcome::Dropped(e) = bridge.tick(&mut ctx.wired_in, &mut ctx.tx, &ctx.state) {
                    debug!("tick: packet dropped ({:?})", e);
                }

                let framer = bridge.framer_stats();
                ctx.framer.send_if_modified(|current| {
                    let changed = *current != framer;
                    *current = framer;
                    changed
                });

                let (state, wired_rx, wired_tx) = (&ctx.state, ctx.wired_rx, ctx.wired_tx);
                housekeeping.tick(
                    || HeartbeatReport::new(state.snapshot(), wired_stats(wired_rx, wired_tx), framer, None),
                    &mut ctx.diagnostics,
                    &mut led,
                );
            }
            Some(command) = ctx.commands.recv() => match command {
                Command::SetChannel(number, reply) => {
                    let result = match ctx.tx.set_channel(number) {
                        Ok(()) => {
                            ctx.channel.send_replace(ctx.tx.channel());
                            Ok(())
                        }
                        Err(LinkError::Channel(e)) => Err(HostError::Channel(e)),
                        Err(LinkError::Radio(e)) => Err(HostError::Io(e)),
                    };
                    let _ = reply.send(result);
                }
            },
        }
    }
}

/// Capture context: datagrams through the receive filter into the wired-out ring
///
/// Our own broadcasts looped back by the socket are skipped before the filter,
/// the way a radio never captures its own transmissions.
async fn medium_task(
    socket: UdpSocket,
    own_addr: SocketAddr,
    mut adapter: CaptureAdapter,
    state: Arc<LinkState>,
    mut wired_out: Producer<'static, WIRED_TX_BUFFER_SIZE>,
    mut channel: watch::Receiver<Channel>,
    outbound: Arc<Notify>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    loop {
        let len = match recv_datagram(&socket, &mut buf).await {
            Ok((_, from)) if from == own_addr => continue,
            Ok((len, _)) => len,
            Err(e) => {
                warn!("medium: receive failed: {}", e);
                continue;
            }
        };

        if channel.has_changed().unwrap_or(false) {
            adapter.set_channel(*channel.borrow_and_update());
        }
        if adapter.deliver(&state, &buf[..len], &mut wired_out).is_some() {
            outbound.notify_one();
        }
    }
}
