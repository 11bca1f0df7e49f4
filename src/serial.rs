//! Serial port access for rotary table controllers.

use crate::base::{Result, SerialLink};
use crate::internals::*;
use log::{debug, trace};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use std::io;
use std::time::Duration;

/// How to reach the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    /// Timeout of a single port read; the channel enforces the response deadline on top.
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// Settings for a table behind an RS-485 converter.
    pub fn rs_converter() -> SerialSettings {
        SerialSettings {
            baud_rate: RS_CONVERTER_BAUD_RATE,
            read_timeout: DEFAULT_PORT_READ_TIMEOUT,
        }
    }

    /// Settings for the controller's own USB port.
    pub fn usb() -> SerialSettings {
        SerialSettings {
            baud_rate: USB_BAUD_RATE,
            read_timeout: DEFAULT_PORT_READ_TIMEOUT,
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings::rs_converter()
    }
}

/// Opens `port_name` as 8N1 with the given settings.
pub fn open_port(port_name: &str, settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    debug!(
        "Opening serial port {} at {} baud",
        port_name, settings.baud_rate
    );
    let port = serialport::new(port_name, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(settings.read_timeout)
        .open()?;
    Ok(port)
}

/// Serial ports present on this machine. Not every port may be listed.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports()?;
    trace!("Found {} serial ports", ports.len());
    Ok(ports)
}

/// Returns `true` when `port` is the USB port of a turntable controller.
pub fn is_supported_port(port: &SerialPortInfo) -> bool {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => is_controller_usb_id(usb.vid, usb.pid),
        _ => false,
    }
}

fn is_controller_usb_id(vid: u16, pid: u16) -> bool {
    vid == CONTROLLER_USB_VID && pid == CONTROLLER_USB_PID
}

impl SerialLink for dyn SerialPort {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn release_direction(&mut self) -> io::Result<()> {
        self.write_request_to_send(true)?;
        Ok(())
    }
}
