use crate::error::{AvError, Result};
use crate::protocol::{RpcReply, RpcRequest};
use crate::types::AmpPower;
use reqwest::header::ACCEPT;
use std::future::Future;
use std::time::Duration;

/// Port of the amplifier's audio control API
pub const AMPLIFIER_PORT: u16 = 10000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Amplifier control surface
pub trait Amplifier: Send + Sync + 'static {
    fn set_power(&self, state: AmpPower) -> impl Future<Output = Result<()>> + Send;
}

/// Client for a Sony receiver's JSON-RPC audio control API
///
/// The API answers HTTP 200 even for application-level failures. Only a
/// non-2xx status is treated as an error; an error embedded in a 200 body is
/// logged and otherwise ignored.
pub struct SonyAmplifier {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl SonyAmplifier {
    /// Create a client for the amplifier at `host`
    ///
    /// A missing or blank host yields a client whose every call fails with
    /// [`AvError::Connection`].
    pub fn new(host: Option<&str>) -> Result<Self> {
        Self::with_port(host, AMPLIFIER_PORT)
    }

    /// Create a client for a non-standard port
    pub fn with_port(host: Option<&str>, port: u16) -> Result<Self> {
        let endpoint = host
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| format!("http://{}:{}/sony/system", h, port));

        if endpoint.is_none() {
            tracing::error!("Amplifier address not set, amplifier commands will fail");
        }

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { client, endpoint })
    }

    /// Full URL requests are posted to, if configured
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    async fn post(&self, request: &RpcRequest) -> Result<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| AvError::Connection("Amplifier address not configured".to_string()))?;

        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        match response.text().await {
            Ok(body) => tracing::debug!("Amplifier error body: {}", body),
            Err(e) => tracing::error!("Unable to read body of error response: {}", e),
        }

        Err(AvError::protocol(format!("Amplifier returned HTTP {}", status)))
    }
}

impl Amplifier for SonyAmplifier {
    async fn set_power(&self, state: AmpPower) -> Result<()> {
        let request = RpcRequest::set_power_status(state)?;
        let body = self.post(&request).await?;
        tracing::debug!("Amplifier response: {}", body);

        match RpcReply::parse(&body) {
            Ok(RpcReply::Error { code, message }) => {
                tracing::warn!(
                    "Amplifier reported error {} ({}) for power {}; not treated as failure",
                    code,
                    message,
                    state.as_str()
                );
            }
            Ok(RpcReply::Result(_)) => {}
            Err(e) => tracing::debug!("Amplifier reply not decodable: {}", e),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response, returning the raw request text
    async fn serve_once(status_line: &'static str, body: &'static str) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });

        (port, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn posts_power_request() {
        let (port, server) = serve_once("200 OK", r#"{"result":[],"id":1}"#).await;
        let amp = SonyAmplifier::with_port(Some("127.0.0.1"), port).unwrap();

        amp.set_power(AmpPower::Active).await.unwrap();

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /sony/system HTTP/1.1"));
        assert!(lower.contains("accept: application/json"));
        assert!(request.contains(r#""method":"setPowerStatus""#));
        assert!(request.contains(r#""params":[{"status":"active"}]"#));
    }

    #[tokio::test]
    async fn server_error_is_protocol_error() {
        let (port, server) = serve_once("500 Internal Server Error", "oops").await;
        let amp = SonyAmplifier::with_port(Some("127.0.0.1"), port).unwrap();

        let err = amp.set_power(AmpPower::Off).await.unwrap_err();
        assert!(matches!(err, AvError::Protocol { .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn error_inside_ok_reply_is_not_a_failure() {
        let (port, server) =
            serve_once("200 OK", r#"{"error":[40000,"Display Is Turned off"],"id":1}"#).await;
        let amp = SonyAmplifier::with_port(Some("127.0.0.1"), port).unwrap();

        assert!(amp.set_power(AmpPower::Off).await.is_ok());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_host_fails_without_network() {
        let amp = SonyAmplifier::new(None).unwrap();
        assert!(amp.endpoint().is_none());
        assert!(matches!(
            amp.set_power(AmpPower::Active).await,
            Err(AvError::Connection(_))
        ));

        let amp = SonyAmplifier::new(Some("  ")).unwrap();
        assert!(matches!(
            amp.set_power(AmpPower::Active).await,
            Err(AvError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn endpoint_uses_fixed_port() {
        let amp = SonyAmplifier::new(Some("192.168.1.50")).unwrap();
        assert_eq!(amp.endpoint(), Some("http://192.168.1.50:10000/sony/system"));
    }
}
