/// Sensor readings delivered as text lines by a hardware bridge
use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::models::SensorSample;
use crate::sensor::{SensorError, SensorSource};

// Queue depth between the reader task and the loop
const FEED_CAPACITY: usize = 64;

/// Parse one `co2,temperature,humidity` line
///
/// Returns None for blank or malformed lines.
pub fn parse_sample_line(line: &str) -> Option<SensorSample> {
    let record = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(line.as_bytes())
        .records()
        .next()?
        .ok()?;
    if record.len() != 3 {
        return None;
    }
    let (co2, temperature, humidity): (f32, f32, f32) = record.deserialize(None).ok()?;
    if !(co2.is_finite() && temperature.is_finite() && humidity.is_finite()) {
        return None;
    }
    if !(0.0..=u16::MAX as f32).contains(&co2) {
        return None;
    }
    Some(SensorSample {
        co2: co2.round() as u16,
        temperature,
        humidity,
    })
}

/// Samples read line by line from a file, FIFO or stdin.
///
/// A background task parses lines into a bounded queue; the loop polls the
/// queue without blocking. When the feed ends the source reports
/// `SensorError::Closed` once the queue is drained.
pub struct LineFeedSensor {
    rx: mpsc::Receiver<SensorSample>,
    pending: Option<SensorSample>,
    closed: bool,
}

impl LineFeedSensor {
    pub fn spawn<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_sample_line(&line) {
                            Some(sample) => {
                                if tx.send(sample).await.is_err() {
                                    break;
                                }
                            }
                            None => warn!("Dropping malformed sensor line: '{}'", line),
                        }
                    }
                    Ok(None) => {
                        info!("Sensor feed reached end of input");
                        break;
                    }
                    Err(e) => {
                        warn!("Sensor feed read error: {}", e);
                        break;
                    }
                }
            }
        });

        LineFeedSensor {
            rx,
            pending: None,
            closed: false,
        }
    }

    /// Open a file or named pipe as the feed
    pub async fn open(path: &str) -> Result<Self, SensorError> {
        let file = tokio::fs::File::open(path).await?;
        info!("Reading sensor samples from {}", path);
        Ok(Self::spawn(file))
    }

    pub fn stdin() -> Self {
        info!("Reading sensor samples from stdin");
        Self::spawn(tokio::io::stdin())
    }
}

impl SensorSource for LineFeedSensor {
    fn data_ready(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(sample) => {
                self.pending = Some(sample);
                true
            }
            Err(mpsc::error::TryRecvError::Empty) => false,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                if !self.closed {
                    debug!("Sensor feed disconnected");
                }
                self.closed = true;
                false
            }
        }
    }

    fn read(&mut self) -> Result<SensorSample, SensorError> {
        if let Some(sample) = self.pending.take() {
            return Ok(sample);
        }
        if self.closed {
            return Err(SensorError::Closed);
        }
        Err(SensorError::NotReady)
    }

    fn is_closed(&self) -> bool {
        self.closed && self.pending.is_none()
    }
}
