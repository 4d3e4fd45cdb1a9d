//! Synchronous DNS resolver auxiliary (`spec.md` §4.8).
//!
//! `Resolver` owns one UDP socket. The foreground sends queries and blocks
//! the caller on a condition variable until the matching transaction id
//! shows up, or the timeout elapses. A background thread owns the read
//! side: it polls the same socket edge-triggered with a 1-second idle tick
//! (the only place in this system that puts a timeout on `poll`, so the
//! thread can still notice `stop` promptly — `spec.md` §5) and parses every
//! datagram into the response table.

mod error;
mod wire;

pub use error::ResolverError;
pub use wire::{build_query, parse_response};

use mio::net::UdpSocket as MioUdpSocket;
use mio::{Events, Interest, Poll, Token};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const LISTENER_TOKEN: Token = Token(0);
const LISTENER_TICK: Duration = Duration::from_secs(1);

struct Shared {
    responses: Mutex<HashMap<u16, Vec<String>>>,
    cv: Condvar,
    exit_reason: Mutex<Option<String>>,
}

/// A resolver bound to one UDP socket, with its own background listener.
pub struct Resolver {
    socket: UdpSocket,
    transaction_id: AtomicU16,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl Resolver {
    /// Take ownership of `socket` and launch the background listener.
    pub fn new(socket: UdpSocket) -> std::io::Result<Self> {
        socket.set_nonblocking(true)?;
        let listener_socket = MioUdpSocket::from_std(socket.try_clone()?);
        let shared = Arc::new(Shared {
            responses: Mutex::new(HashMap::new()),
            cv: Condvar::new(),
            exit_reason: Mutex::new(None),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let listener = {
            let shared = shared.clone();
            let stop = stop.clone();
            std::thread::spawn(move || listen(listener_socket, shared, stop))
        };

        Ok(Self {
            socket,
            transaction_id: AtomicU16::new(0),
            shared,
            stop,
            listener: Some(listener),
        })
    }

    /// Send an A-record query for `name` to `server:port`. Returns the
    /// transaction id to pass to [`Resolver::wait_for_result`].
    pub fn send_query<A: ToSocketAddrs>(
        &self,
        name: &str,
        server: A,
    ) -> Result<u16, ResolverError> {
        let id = self.transaction_id.fetch_add(1, Ordering::Relaxed);
        let query = build_query(name, id);
        self.socket.send_to(&query, server)?;
        Ok(id)
    }

    /// Block until a response to `transaction_id` arrives or `timeout`
    /// elapses.
    pub fn wait_for_result(
        &self,
        transaction_id: u16,
        timeout: Duration,
    ) -> Result<Vec<String>, ResolverError> {
        let deadline = Instant::now() + timeout;
        let mut responses = self.shared.responses.lock();
        loop {
            if let Some(result) = responses.remove(&transaction_id) {
                return Ok(result);
            }
            if let Some(reason) = self.shared.exit_reason.lock().clone() {
                return Err(ResolverError::ListenerStopped(reason));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ResolverError::Timeout(transaction_id));
            }
            self.shared.cv.wait_for(&mut responses, deadline - now);
        }
    }

    /// The socket's locally bound address, as `addr:port`.
    pub fn local_addr(&self) -> std::io::Result<String> {
        let addr = self.socket.local_addr()?;
        Ok(format!("{}:{}", addr.ip(), addr.port()))
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
    }
}

fn listen(mut socket: MioUdpSocket, shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    let mut poll = match Poll::new() {
        Ok(p) => p,
        Err(e) => {
            *shared.exit_reason.lock() = Some(e.to_string());
            return;
        }
    };
    if let Err(e) = poll
        .registry()
        .register(&mut socket, LISTENER_TOKEN, Interest::READABLE)
    {
        *shared.exit_reason.lock() = Some(e.to_string());
        return;
    }

    let mut events = Events::with_capacity(8);
    let mut buf = [0u8; 65536];
    while !stop.load(Ordering::Acquire) {
        match poll.poll(&mut events, Some(LISTENER_TICK)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                *shared.exit_reason.lock() = Some(e.to_string());
                return;
            }
        }
        for event in events.iter() {
            if event.token() != LISTENER_TOKEN || !event.is_readable() {
                continue;
            }
            loop {
                match socket.recv_from(&mut buf) {
                    Ok((n, _from)) => match parse_response(&buf[..n]) {
                        Ok((transaction_id, addrs)) => {
                            let mut responses = shared.responses.lock();
                            responses.insert(transaction_id, addrs);
                            shared.cv.notify_all();
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping unparseable DNS response");
                        }
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        *shared.exit_reason.lock() = Some(e.to_string());
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn local_udp_socket() -> UdpSocket {
        UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap()
    }

    #[test]
    fn send_query_allocates_increasing_transaction_ids() {
        let client = Resolver::new(local_udp_socket()).unwrap();
        let server_addr = local_udp_socket().local_addr().unwrap();
        let first = client.send_query("example.com", server_addr).unwrap();
        let second = client.send_query("example.com", server_addr).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn wait_for_result_times_out_with_no_reply() {
        let client = Resolver::new(local_udp_socket()).unwrap();
        let err = client
            .wait_for_result(0xbeef, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, ResolverError::Timeout(0xbeef)));
    }

    #[test]
    fn end_to_end_query_and_reply_round_trip() {
        let client = Resolver::new(local_udp_socket()).unwrap();
        let fake_server = local_udp_socket();
        let server_addr = fake_server.local_addr().unwrap();

        let txid = client.send_query("example.com", server_addr).unwrap();

        // Act as the DNS server: read the query, reply with one A record.
        let mut buf = [0u8; 512];
        let (n, client_addr) = fake_server.recv_from(&mut buf).unwrap();
        let (parsed_txid, _) = parse_response(&buf[..n]).unwrap_or((txid, vec![]));
        let _ = parsed_txid;

        let mut response = vec![0u8; 12];
        response[0..2].copy_from_slice(&txid.to_be_bytes());
        response[3] = 0x80;
        response[5] = 1;
        response[7] = 1;
        response.extend(wire::encode_name("example.com"));
        response.extend_from_slice(&1u16.to_be_bytes());
        response.extend_from_slice(&1u16.to_be_bytes());
        response.push(0xc0);
        response.push(12);
        response.extend_from_slice(&1u16.to_be_bytes());
        response.extend_from_slice(&1u16.to_be_bytes());
        response.extend_from_slice(&60u32.to_be_bytes());
        response.extend_from_slice(&4u16.to_be_bytes());
        response.extend_from_slice(&[93, 184, 216, 34]);
        fake_server.send_to(&response, client_addr).unwrap();

        let result = client
            .wait_for_result(txid, Duration::from_secs(2))
            .unwrap();
        assert_eq!(result, vec!["93.184.216.34".to_string()]);
    }
}
