//! Rotor control client module.
//!
//! This module implements the client side of the rotctld-style TCP
//! protocol: `P <az> <el>` commands a position, `p` queries the rotor's
//! reported position. Every call is a fresh connection: connect, send,
//! (receive,) close. No retries are performed here; the caller's next tick
//! is the natural retry.

use crate::{moon::HorizontalPosition, TrackerError, TrackerResult};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Upper bound on a single rotor response read.
const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Default per-call timeout. Kept shorter than the default 5 s tracking
/// cadence so an unresponsive rotor cannot stall the scheduler across ticks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Network endpoint of the rotor control daemon (e.g. hamlib rotctld).
#[derive(Debug, Clone)]
pub struct RotorEndpoint {
    pub host: String,
    pub port: u16,
}

impl RotorEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Client for a rotctld-style rotor endpoint. Stateless per call.
#[derive(Debug, Clone)]
pub struct RotorClient {
    endpoint: RotorEndpoint,
    timeout: Option<Duration>,
}

impl RotorClient {
    /// Creates a client with the default per-call timeout.
    pub fn new(endpoint: RotorEndpoint) -> Self {
        Self {
            endpoint,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Creates a client with an explicit per-call timeout. `None` restores
    /// platform-default blocking behavior; a call may then block
    /// indefinitely on an unresponsive endpoint.
    pub fn with_timeout(endpoint: RotorEndpoint, timeout: Option<Duration>) -> Self {
        Self { endpoint, timeout }
    }

    pub fn endpoint(&self) -> &RotorEndpoint {
        &self.endpoint
    }

    /// Commands the rotor to move to (azimuth, elevation), in degrees.
    ///
    /// Sends `P <az> <el>` with no trailing terminator and does not read a
    /// reply; closing the connection flushes the command.
    pub fn set_position(&self, azimuth: f64, elevation: f64) -> TrackerResult<()> {
        let mut stream = self.connect()?;
        let command = format!("P {azimuth:.2} {elevation:.2}");
        stream.write_all(command.as_bytes()).map_err(map_io_error)?;
        log::debug!(
            "rotor {}:{} <- {command}",
            self.endpoint.host,
            self.endpoint.port
        );
        Ok(())
    }

    /// Queries the rotor's self-reported position.
    ///
    /// Sends `p` and parses the response as two newline-separated decimal
    /// numbers, azimuth first.
    pub fn get_position(&self) -> TrackerResult<HorizontalPosition> {
        let mut stream = self.connect()?;
        stream.write_all(b"p").map_err(map_io_error)?;

        let mut buffer = [0u8; RESPONSE_BUFFER_SIZE];
        let n = stream.read(&mut buffer).map_err(map_io_error)?;
        let text = std::str::from_utf8(&buffer[..n])
            .map_err(|e| TrackerError::ProtocolError(format!("invalid UTF-8 in rotor response: {e}")))?;

        let position = parse_position_response(text)?;
        log::debug!(
            "rotor {}:{} reports az={:.2} el={:.2}",
            self.endpoint.host,
            self.endpoint.port,
            position.azimuth,
            position.elevation
        );
        Ok(position)
    }

    fn connect(&self) -> TrackerResult<TcpStream> {
        let addr = self.resolve()?;
        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(map_io_error)?;
        stream.set_read_timeout(self.timeout).map_err(map_io_error)?;
        stream.set_write_timeout(self.timeout).map_err(map_io_error)?;
        Ok(stream)
    }

    fn resolve(&self) -> TrackerResult<SocketAddr> {
        (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(|e| {
                TrackerError::ConnectionError(format!(
                    "cannot resolve {}:{}: {e}",
                    self.endpoint.host, self.endpoint.port
                ))
            })?
            .next()
            .ok_or_else(|| {
                TrackerError::ConnectionError(format!(
                    "no address for {}:{}",
                    self.endpoint.host, self.endpoint.port
                ))
            })
    }
}

fn map_io_error(e: std::io::Error) -> TrackerError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            TrackerError::Timeout(format!("rotor call timed out: {e}"))
        }
        _ => TrackerError::ConnectionError(format!("{e}")),
    }
}

/// Parses a `p` response: two newline-separated decimals, azimuth first.
fn parse_position_response(text: &str) -> TrackerResult<HorizontalPosition> {
    let mut lines = text.lines();

    let az_line = lines.next().ok_or_else(|| {
        TrackerError::ProtocolError("empty rotor response".to_string())
    })?;
    let el_line = lines.next().ok_or_else(|| {
        TrackerError::ProtocolError(format!("expected two lines, got {text:?}"))
    })?;

    let azimuth: f64 = az_line.trim().parse().map_err(|_| {
        TrackerError::ProtocolError(format!("invalid azimuth line {az_line:?}"))
    })?;
    let elevation: f64 = el_line.trim().parse().map_err(|_| {
        TrackerError::ProtocolError(format!("invalid elevation line {el_line:?}"))
    })?;

    Ok(HorizontalPosition { azimuth, elevation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Accepts one connection; if `response` is set, reads one request and
    /// replies with it, otherwise drains the request. Returns what it read.
    fn oneshot_server(
        response: Option<&'static [u8]>,
    ) -> (RotorEndpoint, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            if let Some(reply) = response {
                let mut buffer = [0u8; 64];
                let n = stream.read(&mut buffer).unwrap();
                received.extend_from_slice(&buffer[..n]);
                stream.write_all(reply).unwrap();
            } else {
                stream.read_to_end(&mut received).unwrap();
            }
            received
        });
        (RotorEndpoint::new("127.0.0.1", addr.port()), handle)
    }

    #[test]
    fn set_position_sends_single_p_command() {
        let (endpoint, handle) = oneshot_server(None);
        let client = RotorClient::new(endpoint);

        client.set_position(270.0, 45.0).unwrap();

        let received = handle.join().unwrap();
        assert_eq!(received, b"P 270.00 45.00");
    }

    #[test]
    fn get_position_parses_two_line_response() {
        let (endpoint, handle) = oneshot_server(Some(b"123.45\n67.89\n"));
        let client = RotorClient::new(endpoint);

        let position = client.get_position().unwrap();
        assert_eq!(position.azimuth, 123.45);
        assert_eq!(position.elevation, 67.89);

        let received = handle.join().unwrap();
        assert_eq!(received, b"p");
    }

    #[test]
    fn get_position_rejects_single_line_response() {
        let (endpoint, handle) = oneshot_server(Some(b"123.45\n"));
        let client = RotorClient::new(endpoint);

        let err = client.get_position().unwrap_err();
        assert!(matches!(err, TrackerError::ProtocolError(_)), "{err}");
        let _ = handle.join();
    }

    #[test]
    fn get_position_rejects_non_numeric_response() {
        let (endpoint, handle) = oneshot_server(Some(b"azimuth\nelevation\n"));
        let client = RotorClient::new(endpoint);

        let err = client.get_position().unwrap_err();
        assert!(matches!(err, TrackerError::ProtocolError(_)), "{err}");
        let _ = handle.join();
    }

    #[test]
    fn unreachable_endpoint_is_a_connection_error() {
        // Bind then drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = RotorClient::new(RotorEndpoint::new("127.0.0.1", port));
        let err = client.set_position(0.0, 0.0).unwrap_err();
        assert!(
            matches!(err, TrackerError::ConnectionError(_) | TrackerError::Timeout(_)),
            "{err}"
        );
    }

    #[test]
    fn stalled_rotor_surfaces_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = RotorEndpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
        let handle = thread::spawn(move || {
            // Accept and sit on the connection without ever replying.
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(600));
            drop(stream);
        });

        let client = RotorClient::with_timeout(endpoint, Some(Duration::from_millis(200)));
        let err = client.get_position().unwrap_err();
        assert!(matches!(err, TrackerError::Timeout(_)), "{err}");
        handle.join().unwrap();
    }

    #[test]
    fn parse_position_response_cases() {
        let pos = parse_position_response("123.45\n67.89\n").unwrap();
        assert_eq!(pos.azimuth, 123.45);
        assert_eq!(pos.elevation, 67.89);

        // Trailing newline on the last line is not required.
        let pos = parse_position_response("0.0\n-5.5").unwrap();
        assert_eq!(pos.azimuth, 0.0);
        assert_eq!(pos.elevation, -5.5);

        assert!(parse_position_response("").is_err());
        assert!(parse_position_response("123.45\n").is_err());
        assert!(parse_position_response("abc\n1.0\n").is_err());
    }
}
