//! Listener capability for transports that feed an RPC server.
//!
//! The store itself never listens on anything. Callers that serve queries
//! over a transport hand the server something implementing [`Listener`]:
//!
//! | Type | Connections come from |
//! |------|-----------------------|
//! | [`TcpListenerAdapter`] | a bound `std::net::TcpListener` |
//! | [`PushListener`] | another component calling [`PushListener::push`] (tunnels, brokers, tests) |
//!
//! Once closed, a listener stops yielding connections: blocked and later
//! `accept` calls fail with `ConnectionAborted`.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Source of inbound connections.
pub trait Listener: Send + Sync {
    /// Connection handed out by [`accept`](Self::accept)
    type Conn;
    /// Address the listener reports
    type Addr: fmt::Display;

    /// Block until the next connection arrives
    fn accept(&self) -> io::Result<Self::Conn>;

    /// Stop accepting; wakes blocked `accept` calls
    fn close(&self) -> io::Result<()>;

    /// Address this listener is reachable at
    fn local_addr(&self) -> io::Result<Self::Addr>;
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "listener closed")
}

// =============================================================================
// TCP
// =============================================================================

/// [`Listener`] over a bound TCP socket
#[derive(Debug)]
pub struct TcpListenerAdapter {
    inner: TcpListener,
    closed: AtomicBool,
}

impl TcpListenerAdapter {
    /// Bind a new TCP listener
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        TcpListener::bind(addr).map(Self::from_std)
    }

    /// Wrap an already bound listener
    pub fn from_std(inner: TcpListener) -> Self {
        Self {
            inner,
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`close`](Listener::close) was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Listener for TcpListenerAdapter {
    type Conn = (TcpStream, SocketAddr);
    type Addr = SocketAddr;

    fn accept(&self) -> io::Result<Self::Conn> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let conn = self.inner.accept()?;
        // The wake-up connection from close() lands here.
        if self.is_closed() {
            return Err(closed_error());
        }
        Ok(conn)
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut addr = self.inner.local_addr()?;
        if addr.ip().is_unspecified() {
            let loopback = match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            addr.set_ip(loopback);
        }
        debug!(%addr, "closing tcp listener");
        // std has no way to interrupt accept(); connect to ourselves instead.
        // A refused connection means nobody is blocked, which is fine.
        let _ = TcpStream::connect(addr);
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

// =============================================================================
// Push
// =============================================================================

/// Address of a [`PushListener`]: whatever name the feeding transport uses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerAddr(pub String);

impl fmt::Display for ListenerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct PushState<C> {
    queue: VecDeque<C>,
    closed: bool,
}

/// [`Listener`] fed by another component
///
/// Connections passed to [`push`](Self::push) come out of
/// [`accept`](Listener::accept) in order.
pub struct PushListener<C> {
    addr: ListenerAddr,
    state: Mutex<PushState<C>>,
    ready: Condvar,
}

impl<C> PushListener<C> {
    /// Create an open listener reporting `addr`
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: ListenerAddr(addr.into()),
            state: Mutex::new(PushState {
                queue: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Hand a connection to the next `accept`
    ///
    /// Once the listener is closed the connection is given back.
    pub fn push(&self, conn: C) -> Result<(), C> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(conn);
        }
        state.queue.push_back(conn);
        self.ready.notify_one();
        Ok(())
    }

    /// Connections pushed but not yet accepted
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl<C: Send> Listener for PushListener<C> {
    type Conn = C;
    type Addr = ListenerAddr;

    fn accept(&self) -> io::Result<C> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(closed_error());
            }
            if let Some(conn) = state.queue.pop_front() {
                return Ok(conn);
            }
            self.ready.wait(&mut state);
        }
    }

    fn close(&self) -> io::Result<()> {
        let dropped = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.queue)
        };
        debug!(addr = %self.addr, dropped = dropped.len(), "closing push listener");
        self.ready.notify_all();
        Ok(())
    }

    fn local_addr(&self) -> io::Result<ListenerAddr> {
        Ok(self.addr.clone())
    }
}

impl<C> fmt::Debug for PushListener<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PushListener")
            .field("addr", &self.addr)
            .field("pending", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
