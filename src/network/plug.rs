/// TP-Link smart-plug client for the local TCP protocol
use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::network::{with_timeout, Actuator, NetworkError};

// Protocol constants
const KASA_PORT: u16 = 9999;
const INITIAL_KEY: u8 = 171; // Autokey cipher seed
const MAX_RESPONSE_LEN: usize = 64 * 1024;

/// Obfuscate a payload with the plug's autokey XOR cipher
///
/// Each output byte becomes the key for the next one.
pub fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|&b| {
            key ^= b;
            key
        })
        .collect()
}

/// Reverse `encrypt`: each ciphertext byte is the key for the next one
pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&c| {
            let plain = key ^ c;
            key = c;
            plain
        })
        .collect()
}

/// Smart plug addressed by IP (or host), port 9999 unless given.
pub struct KasaPlug {
    addr: String,
    timeout: Duration,
}

impl KasaPlug {
    pub fn new(addr: &str, timeout: Duration) -> Self {
        let addr = match addr.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => addr.to_string(),
            _ => format!("{}:{}", addr, KASA_PORT),
        };
        KasaPlug { addr, timeout }
    }

    /// Send one JSON command and return the decoded JSON reply
    async fn request(&self, command: &Value) -> Result<Value, NetworkError> {
        let payload = serde_json::to_vec(command)?;
        let addr = self.addr.clone();

        with_timeout(self.timeout, async move {
            let mut stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| NetworkError::Connect {
                    addr: addr.clone(),
                    source,
                })?;

            let mut frame = Vec::with_capacity(payload.len() + 4);
            frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            frame.extend_from_slice(&encrypt(&payload));
            stream.write_all(&frame).await?;

            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await?;
            let len = u32::from_be_bytes(len_buf) as usize;
            if len > MAX_RESPONSE_LEN {
                return Err(NetworkError::Protocol(format!(
                    "response of {} bytes exceeds limit",
                    len
                )));
            }

            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).await?;
            let reply: Value = serde_json::from_slice(&decrypt(&body))?;
            debug!("Plug {} replied: {}", addr, reply);
            Ok(reply)
        })
        .await
    }
}

fn err_code(section: &Value) -> Result<(), NetworkError> {
    match section.get("err_code").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => Err(NetworkError::Protocol(format!(
            "plug reported err_code {}",
            code
        ))),
    }
}

#[async_trait]
impl Actuator for KasaPlug {
    fn address(&self) -> &str {
        &self.addr
    }

    async fn get_state(&mut self) -> Result<bool, NetworkError> {
        let reply = self
            .request(&json!({"system": {"get_sysinfo": {}}}))
            .await?;
        let info = &reply["system"]["get_sysinfo"];
        err_code(info)?;
        info["relay_state"]
            .as_i64()
            .map(|state| state != 0)
            .ok_or_else(|| NetworkError::Protocol("sysinfo without relay_state".into()))
    }

    async fn set_state(&mut self, on: bool) -> Result<(), NetworkError> {
        let reply = self
            .request(&json!({"system": {"set_relay_state": {"state": on as u8}}}))
            .await?;
        let section = &reply["system"]["set_relay_state"];
        if section.is_null() {
            return Err(NetworkError::Protocol("missing set_relay_state reply".into()));
        }
        err_code(section)
    }
}
