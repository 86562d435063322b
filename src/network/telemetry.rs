/// Form-encoded HTTP POST of every reading to a remote recorder
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use log::debug;
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

use crate::models::Reading;
use crate::network::{with_timeout, NetworkError, TelemetrySink};
use crate::utils::{format_datetime, format_decimal};

/// Encode a reading as the `time`, `co2`, `temp`, `humidity` form fields
pub fn encode_form(reading: &Reading) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("time", &format_datetime(&reading.timestamp))
        .append_pair("co2", &reading.co2.to_string())
        .append_pair("temp", &format_decimal(reading.temperature))
        .append_pair("humidity", &format_decimal(reading.humidity))
        .finish()
}

pub struct HttpTelemetry {
    url: Url,
    timeout: Duration,
}

impl HttpTelemetry {
    /// Only plain `http://` endpoints are supported.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let url = Url::parse(endpoint)?;
        if url.scheme() != "http" {
            return Err(NetworkError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(NetworkError::Protocol(format!("no host in {}", endpoint)));
        }
        Ok(HttpTelemetry { url, timeout })
    }

    pub fn endpoint(&self) -> &str {
        self.url.as_str()
    }

    /// `host[:port]` for both the socket and the Host header
    fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn build_request(&self, body: String) -> Result<Request<Full<Bytes>>, NetworkError> {
        let target = match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        };
        let request = Request::builder()
            .method(Method::POST)
            .uri(target)
            .header(HOST, self.authority())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::from(body))
            .map_err(|e| NetworkError::Protocol(format!("invalid request: {}", e)))?;
        Ok(request)
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetry {
    async fn post(&mut self, reading: &Reading) -> Result<(), NetworkError> {
        let request = self.build_request(encode_form(reading))?;
        let host = self.url.host_str().unwrap_or_default().to_string();
        let port = self.url.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host, port);

        with_timeout(self.timeout, async move {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| NetworkError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("Telemetry connection closed with error: {}", e);
                }
            });

            let response = sender.send_request(request).await?;
            let status = response.status();
            debug!("Telemetry {} answered {}", addr, status);

            if status.is_success() {
                Ok(())
            } else {
                Err(NetworkError::Http(status.as_u16()))
            }
        })
        .await
    }
}
