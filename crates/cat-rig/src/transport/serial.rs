//! Serial port transport
//!
//! Radios use 8 data bits and no parity. Stop bits and flow control come
//! from the capability descriptor: some legacy Yaesu radios want two stop
//! bits at 4800 baud, and a few models need RTS/CTS.

use std::time::Duration;

use async_trait::async_trait;
use cat_protocol::RadioCapabilities;
use serde::{Deserialize, Serialize};
use serialport::{available_ports, SerialPortType};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use super::{StreamTransport, Transport};
use crate::error::{Result, RigError};

/// Number of stop bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopBits {
    /// One stop bit
    #[default]
    One,
    /// Two stop bits
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Flow control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowControl {
    /// No flow control
    #[default]
    None,
    /// RTS/CTS
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial port parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Flow control
    pub flow_control: FlowControl,
}

impl SerialConfig {
    /// 8N1 at `baud_rate`, no flow control
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }

    /// Parameters a model expects out of the box
    pub fn for_model(port: impl Into<String>, caps: &RadioCapabilities) -> Self {
        Self {
            port: port.into(),
            baud_rate: caps.default_baud,
            stop_bits: if caps.stop_bits >= 2 {
                StopBits::Two
            } else {
                StopBits::One
            },
            flow_control: if caps.hardware_flow_control {
                FlowControl::Hardware
            } else {
                FlowControl::None
            },
        }
    }

    /// Override the baud rate (the radio's menu setting may differ from the factory default)
    pub fn with_baud(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Transport over a serial port
///
/// The port is opened by [`open`](Transport::open) and closed by
/// [`close`](Transport::close), and can be reopened afterwards.
pub struct SerialTransport {
    config: SerialConfig,
    inner: Option<StreamTransport<SerialStream>>,
}

impl SerialTransport {
    /// Create a transport; the port is not touched until `open`
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            inner: None,
        }
    }

    /// Port parameters
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn inner(&mut self) -> Result<&mut StreamTransport<SerialStream>> {
        self.inner.as_mut().ok_or(RigError::NotConnected)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        let config = &self.config;
        debug!(
            "Opening {} at {} baud ({:?} stop bits, {:?} flow control)",
            config.port, config.baud_rate, config.stop_bits, config.flow_control
        );

        let mut stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(config.stop_bits.into())
            .flow_control(config.flow_control.into())
            .timeout(Duration::from_millis(100))
            .open_native_async()?;

        // DTR/RTS are often wired to PTT or CW key inputs
        if let Err(e) = stream.write_data_terminal_ready(false) {
            warn!("{}: failed to de-assert DTR: {}", config.port, e);
        }
        if config.flow_control == FlowControl::None {
            if let Err(e) = stream.write_request_to_send(false) {
                warn!("{}: failed to de-assert RTS: {}", config.port, e);
            }
        }

        info!("Opened serial port {}", config.port);
        self.inner = Some(StreamTransport::new(config.port.clone(), stream));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.close().await?;
            info!("Closed serial port {}", self.config.port);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let inner = self.inner()?;
        if let Some(stream) = inner.stream_mut() {
            if let Err(e) = stream.clear(tokio_serial::ClearBuffer::Input) {
                warn!("failed to clear serial input buffer: {}", e);
            }
        }
        inner.flush().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner()?.write(data).await
    }

    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Vec<u8>> {
        self.inner()?.read_until(terminator, timeout).await
    }

    fn is_open(&self) -> bool {
        self.inner.as_ref().is_some_and(|t| t.is_open())
    }
}

/// A serial port found on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB product string, if a USB port
    pub product: Option<String>,
    /// USB vendor and product IDs, if a USB port
    pub usb_id: Option<(u16, u16)>,
}

/// Enumerate serial ports
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                port: p.port_name,
                product: usb.product,
                usb_id: Some((usb.vid, usb.pid)),
            },
            _ => PortInfo {
                port: p.port_name,
                product: None,
                usb_id: None,
            },
        })
        .collect())
}
