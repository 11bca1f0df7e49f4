use std::time::Duration;

/// Default time to wait for a complete response frame.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Read timeout configured on serial ports. Short, so the channel keeps control of the
/// overall response deadline.
pub const DEFAULT_PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Baud rate of the RS-485 converter link.
pub const RS_CONVERTER_BAUD_RATE: u32 = 38_400;

/// Baud rate of the direct USB controller link.
pub const USB_BAUD_RATE: u32 = 9_600;

/// USB vendor id of the turntable controller.
pub const CONTROLLER_USB_VID: u16 = 0x0483;

/// USB product id of the turntable controller.
pub const CONTROLLER_USB_PID: u16 = 0x5740;

/// Pause between status polls while the table rotates.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause after motion stopped, before measuring.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Pause between halting and setting home.
pub const DEFAULT_HOME_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Pause between halting and disabling on abort.
pub const DEFAULT_ABORT_DELAY: Duration = Duration::from_secs(1);

/// Default rotational speed of a scan in rpm.
pub const DEFAULT_SCAN_SPEED: f64 = 5.0;

/// Default angle step of a scan in degrees.
pub const DEFAULT_ANGLE_STEP: f64 = 5.0;

/// Longest single sleep between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);
