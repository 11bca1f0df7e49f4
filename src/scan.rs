//! Angle-sweep controller.
//!
//! A scan disables the motor so the operator can put the table at its home position by
//! hand, arms that position as home, then visits each target angle in turn: rotate, wait
//! for standstill, settle, measure, persist. Finally the table returns home. A
//! cancellation at any pause, or an error once the operator stage is reached, halts and
//! disables the motor before the scan ends.

use crate::base::{Error, Result, SerialLink};
use crate::internals::*;
use crate::types::{Address, RotationalSpeed};
use crate::RotaryTable;
use log::{debug, error, info, trace, warn};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Stage of a scan. Every transition is traced; errors are logged with the stage they
/// happened in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanState {
    Init,
    AwaitOperatorHome,
    /// Visiting the angle at this index.
    Scanning(usize),
    ReturnHome,
    Done,
    Aborting,
    Aborted,
}

/// How a scan that did not fail ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every angle was measured and the table is back home.
    Completed,
    /// The scan was cancelled; the motor was halted and disabled.
    Aborted,
}

/// Accepted supply voltage range of the power converter, in volts.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SupplyBand {
    pub min_volts: f64,
    pub max_volts: f64,
}

impl SupplyBand {
    pub fn contains(&self, volts: f64) -> bool {
        volts >= self.min_volts && volts <= self.max_volts
    }
}

impl Default for SupplyBand {
    /// 12 V Quick Charge supply.
    fn default() -> Self {
        SupplyBand {
            min_volts: 11.0,
            max_volts: 13.0,
        }
    }
}

/// Scan parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Axis to drive.
    pub address: Address,
    /// Rotational speed in rpm.
    pub speed_rpm: f64,
    pub poll_interval: Duration,
    /// Pause after standstill before measuring.
    pub settle_delay: Duration,
    /// Pause between halting and setting home.
    pub home_settle_delay: Duration,
    /// Pause between halting and disabling when aborting.
    pub abort_delay: Duration,
    /// When set, the power converter is queried first and its voltage checked.
    pub supply_check: Option<SupplyBand>,
    /// When set, a rotation still running after this long fails the scan. `None` waits
    /// forever.
    pub motion_timeout: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            address: Address::default(),
            speed_rpm: DEFAULT_SCAN_SPEED,
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            home_settle_delay: DEFAULT_HOME_SETTLE_DELAY,
            abort_delay: DEFAULT_ABORT_DELAY,
            supply_check: None,
            motion_timeout: None,
        }
    }
}

/// Angles `0, step, 2 * step, ...` strictly below 360 degrees.
pub fn angle_points(step: f64) -> Result<Vec<f64>> {
    if !(step > 0.0 && step.is_finite()) {
        return Err(Error::OutOfRange {
            value: step,
            max: 360.0,
        });
    }
    Ok((0..)
        .map(|i| f64::from(i) * step)
        .take_while(|angle| *angle < 360.0)
        .collect())
}

/// Shared cancellation request, settable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Routes Ctrl-C to this flag. Only one handler may be installed per process.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, cancelling scan");
            flag.cancel();
        })
        .map_err(|e| Error::operation_fail(format!("cannot install interrupt handler: {}", e)))
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps `duration`, waking up regularly to observe cancellation.
    fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
        }
    }
}

/// Confirms that the table was put at its home position by hand.
pub trait Operator {
    /// Blocks until the operator confirms.
    fn confirm_home(&mut self) -> Result<()>;
}

impl<F> Operator for F
where
    F: FnMut() -> Result<()>,
{
    fn confirm_home(&mut self) -> Result<()> {
        self()
    }
}

/// Asks for confirmation on the terminal and waits for Enter.
#[derive(Debug, Clone)]
pub struct ConsoleOperator {
    prompt: String,
}

impl ConsoleOperator {
    pub fn new(prompt: impl Into<String>) -> ConsoleOperator {
        ConsoleOperator {
            prompt: prompt.into(),
        }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        ConsoleOperator::new("Rotate the table to its home position by hand and press Enter...")
    }
}

impl Operator for ConsoleOperator {
    fn confirm_home(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", self.prompt)?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}

/// Takes one measurement at a standstill angle.
pub trait Instrument {
    type Sweep;

    /// Configures the instrument for the scan. Called once, after home is set.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Measures at `angle` degrees.
    fn measure(&mut self, angle: f64) -> Result<Self::Sweep>;
}

/// Writes measurements to durable storage.
pub trait Store<S> {
    fn persist(&mut self, angle: f64, sweep: &S) -> Result<()>;
}

/// Receives each measurement for live display. Must return quickly.
pub trait Monitor<S> {
    fn update(&mut self, angle: f64, sweep: &S);
}

/// The external parties a scan works with.
pub struct Collaborators<'a, I: Instrument> {
    pub operator: &'a mut dyn Operator,
    pub instrument: &'a mut I,
    pub store: &'a mut dyn Store<I::Sweep>,
    pub monitor: Option<&'a mut dyn Monitor<I::Sweep>>,
}

/// Runs a scan on one axis.
///
/// The controller owns the device for the whole run; `run` consumes it so the link is
/// released on every way out, including abort and error.
pub struct ScanController<T: ?Sized> {
    device: RotaryTable<T>,
    config: ScanConfig,
    cancel: CancelFlag,
    state: ScanState,
}

impl<T: ?Sized> ScanController<T>
where
    T: SerialLink,
{
    /// Validates `config` against the device before any frame is sent.
    pub fn new(device: RotaryTable<T>, config: ScanConfig) -> Result<ScanController<T>> {
        if config.address.is_broadcast() {
            error!("Cannot scan on the broadcast address");
            return Err(Error::InvalidAddress {
                address: config.address.value(),
            });
        }
        RotationalSpeed::new(config.speed_rpm, device.speed_format())?;
        Ok(ScanController {
            device,
            config,
            cancel: CancelFlag::new(),
            state: ScanState::Init,
        })
    }

    /// Replaces the cancellation flag, e.g. with one shared with an interrupt handler.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> ScanController<T> {
        self.cancel = cancel;
        self
    }

    /// Handle to cancel the scan from elsewhere.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Visits `angles` in order, measuring and persisting at each.
    ///
    /// Returns `Ok(ScanOutcome::Aborted)` when cancelled. On failure the first error is
    /// returned, after halting and disabling the motor if the operator stage was reached.
    pub fn run<I: Instrument>(
        mut self,
        angles: &[f64],
        collaborators: Collaborators<'_, I>,
    ) -> Result<ScanOutcome> {
        info!(
            "Starting scan of {} angles on axis {}",
            angles.len(),
            self.config.address
        );
        match self.run_sequence(angles, collaborators) {
            Ok(()) => {
                self.transition(ScanState::Done);
                info!("Scan completed");
                Ok(ScanOutcome::Completed)
            }
            Err(Error::Cancelled) => {
                warn!("Scan cancelled in state {:?}", self.state);
                self.abort()?;
                Ok(ScanOutcome::Aborted)
            }
            Err(e) => {
                error!("Scan failed in state {:?}: {}", self.state, e);
                if self.state != ScanState::Init {
                    if let Err(abort_err) = self.abort() {
                        error!("Abort after failure failed too: {}", abort_err);
                    }
                }
                Err(e)
            }
        }
    }

    fn run_sequence<I: Instrument>(
        &mut self,
        angles: &[f64],
        collaborators: Collaborators<'_, I>,
    ) -> Result<()> {
        let Collaborators {
            operator,
            instrument,
            store,
            mut monitor,
        } = collaborators;
        let address = self.config.address;

        if let Some(band) = self.config.supply_check {
            self.check_supply(&band)?;
        }
        self.device.disable(address)?;

        self.transition(ScanState::AwaitOperatorHome);
        operator.confirm_home()?;
        self.cancel.check()?;
        self.device.halt(address)?;
        self.cancel.sleep(self.config.home_settle_delay)?;
        self.device.set_home(address)?;
        instrument.prepare()?;

        for (i, &angle) in angles.iter().enumerate() {
            self.cancel.check()?;
            self.transition(ScanState::Scanning(i));
            self.move_to(angle)?;
            self.cancel.sleep(self.config.settle_delay)?;

            debug!("Measuring at {} deg", angle);
            let sweep = instrument.measure(angle)?;
            store.persist(angle, &sweep)?;
            if let Some(monitor) = monitor.as_mut() {
                monitor.update(angle, &sweep);
            }
            info!("Measured angle {} ({}/{})", angle, i + 1, angles.len());
        }

        self.transition(ScanState::ReturnHome);
        self.move_to(0.0)
    }

    fn check_supply(&mut self, band: &SupplyBand) -> Result<()> {
        let status = match self.device.get_converter_status() {
            Ok(status) => status,
            Err(Error::NoResponse { .. }) => {
                warn!("No power converter answered, skipping supply check");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if !status.is_valid() {
            return Err(Error::InvalidResponse {
                address: status.address().value(),
            });
        }
        let voltage = status.voltage();
        info!("Converter supply voltage {:.2} V", voltage);
        if !status.is_voltage_ok() || !band.contains(voltage) {
            error!(
                "Incorrect supply voltage {:.2} V, expected {:.2} to {:.2} V",
                voltage, band.min_volts, band.max_volts
            );
            return Err(Error::UnsafeSupply { voltage });
        }
        Ok(())
    }

    /// Rotates to `angle` and blocks until the axis reports standstill.
    fn move_to(&mut self, angle: f64) -> Result<()> {
        let address = self.config.address;
        self.device.rotate(address, angle, self.config.speed_rpm)?;

        let started = Instant::now();
        let cancel = &self.cancel;
        let poll_interval = self.config.poll_interval;
        let motion_timeout = self.config.motion_timeout;
        self.device.wait_until_stopped_with(address, || {
            if let Some(limit) = motion_timeout {
                let elapsed = started.elapsed();
                if elapsed > limit {
                    return Err(Error::MotionTimeout {
                        address: address.value(),
                        elapsed,
                    });
                }
            }
            cancel.sleep(poll_interval)
        })?;
        Ok(())
    }

    /// Halts, waits, then disables the motor.
    fn abort(&mut self) -> Result<()> {
        let address = self.config.address;
        self.transition(ScanState::Aborting);
        let halted = self.device.halt(address);
        crate::sleep(self.config.abort_delay);
        let disabled = self.device.disable(address);
        self.transition(ScanState::Aborted);
        halted?;
        disabled?;
        Ok(())
    }

    fn transition(&mut self, next: ScanState) {
        trace!("Scan state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
