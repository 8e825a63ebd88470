//! Minimal statsd counter client
//!
//! Speaks just enough of the statsd wire protocol for this crate: counter
//! increments (`name:delta|c`) over UDP, one metric per datagram via
//! [`StatsClient::incr`] or batched into multi-metric packets via
//! [`StatsClient::pipeline`]. UDP is fire and forget; delivery is not
//! guaranteed and send errors surface as `io::Result` for the caller to
//! swallow.

use std::io;
use std::net::UdpSocket;

use tracing::warn;

use crate::config::StatsdConfig;

/// Largest multi-metric packet the pipeline will send. Matches the
/// conventional statsd limit for payloads that must traverse commodity
/// networks without fragmentation.
const MAX_PACKET_LEN: usize = 512;

/// Counter client bound to one statsd endpoint.
pub struct StatsClient {
    socket: UdpSocket,
    prefix: String,
}

impl StatsClient {
    /// Bind a local socket and resolve the configured endpoint.
    pub fn new(config: &StatsdConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect((config.host.as_str(), config.port))?;
        Ok(Self {
            socket,
            prefix: config.prefix.clone(),
        })
    }

    /// Increment counter `name` by `delta` in a single datagram.
    pub fn incr(&self, name: &str, delta: i64) -> io::Result<()> {
        self.send_packet(&self.format_counter(name, delta))
    }

    /// Start a buffered pipeline. Increments accumulate locally and go out
    /// in as few datagrams as possible on [`Pipeline::send`]; anything still
    /// buffered is flushed when the pipeline is dropped.
    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            client: self,
            lines: Vec::new(),
        }
    }

    fn format_counter(&self, name: &str, delta: i64) -> String {
        format!("{}.{}:{}|c", self.prefix, name, delta)
    }

    fn send_packet(&self, packet: &str) -> io::Result<()> {
        self.socket.send(packet.as_bytes())?;
        Ok(())
    }
}

/// Scoped, buffered counter batch over a borrowed [`StatsClient`].
pub struct Pipeline<'a> {
    client: &'a StatsClient,
    lines: Vec<String>,
}

impl Pipeline<'_> {
    /// Buffer one counter increment.
    pub fn incr(&mut self, name: &str, delta: i64) {
        self.lines.push(self.client.format_counter(name, delta));
    }

    /// Flush everything buffered, packing newline-joined metrics into
    /// datagrams of at most 512 bytes.
    pub fn send(&mut self) -> io::Result<()> {
        let client = self.client;
        let mut packet = String::new();
        for line in self.lines.drain(..) {
            if !packet.is_empty() && packet.len() + 1 + line.len() > MAX_PACKET_LEN {
                client.send_packet(&packet)?;
                packet.clear();
            }
            if !packet.is_empty() {
                packet.push('\n');
            }
            packet.push_str(&line);
        }
        if !packet.is_empty() {
            client.send_packet(&packet)?;
        }
        Ok(())
    }
}

impl Drop for Pipeline<'_> {
    fn drop(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        if let Err(error) = self.send() {
            warn!(%error, "failed to flush statsd pipeline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Loopback statsd sink for assertions.
    fn sink() -> (UdpSocket, StatsdConfig) {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let config = StatsdConfig {
            host: "127.0.0.1".to_string(),
            port: socket.local_addr().unwrap().port(),
            prefix: "python_popcon".to_string(),
        };
        (socket, config)
    }

    fn recv_packet(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 2048];
        let len = socket.recv(&mut buf).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn test_incr_sends_counter_datagram() {
        let (socket, config) = sink();
        let client = StatsClient::new(&config).unwrap();

        client.incr("reports", 1).unwrap();

        assert_eq!(recv_packet(&socket), "python_popcon.reports:1|c");
    }

    #[test]
    fn test_pipeline_batches_into_one_datagram() {
        let (socket, config) = sink();
        let client = StatsClient::new(&config).unwrap();

        let mut pipe = client.pipeline();
        pipe.incr("library_used.statsd", 1);
        pipe.incr("library_used.escapism", 1);
        pipe.incr("library_used.numpy", 1);
        pipe.send().unwrap();

        let packet = recv_packet(&socket);
        assert_eq!(
            packet,
            "python_popcon.library_used.statsd:1|c\n\
             python_popcon.library_used.escapism:1|c\n\
             python_popcon.library_used.numpy:1|c"
        );
    }

    #[test]
    fn test_pipeline_chunks_oversized_batches() {
        let (socket, config) = sink();
        let client = StatsClient::new(&config).unwrap();

        let mut pipe = client.pipeline();
        for i in 0..40 {
            pipe.incr(&format!("library_used.some_long_package_name_{i}"), 1);
        }
        pipe.send().unwrap();

        let mut packets = Vec::new();
        let mut total_lines = 0;
        while total_lines < 40 {
            let packet = recv_packet(&socket);
            assert!(packet.len() <= MAX_PACKET_LEN);
            total_lines += packet.lines().count();
            packets.push(packet);
        }
        assert!(packets.len() > 1);
        assert_eq!(total_lines, 40);
    }

    #[test]
    fn test_drop_flushes_unsent_counters() {
        let (socket, config) = sink();
        let client = StatsClient::new(&config).unwrap();

        {
            let mut pipe = client.pipeline();
            pipe.incr("library_used.escapism", 1);
            // no explicit send
        }

        assert_eq!(
            recv_packet(&socket),
            "python_popcon.library_used.escapism:1|c"
        );
    }

    #[test]
    fn test_empty_pipeline_sends_nothing() {
        let (socket, config) = sink();
        let client = StatsClient::new(&config).unwrap();

        client.pipeline().send().unwrap();

        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut buf = [0u8; 64];
        assert!(socket.recv(&mut buf).is_err());
    }

    #[test]
    fn test_unresolvable_host_is_an_error_not_a_panic() {
        let config = StatsdConfig {
            host: "host.invalid.".to_string(),
            port: 8125,
            prefix: "python_popcon".to_string(),
        };
        assert!(StatsClient::new(&config).is_err());
    }
}
