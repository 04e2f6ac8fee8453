//! Haptic feedback: a coin vibration motor driven by PWM.
//!
//! The motor runs in its own task fed through a bounded command queue, so a
//! pulse never holds up sensor polling. The feedback task does not use the
//! I2C bus.

use crate::config::FeedbackSettings;
use crate::errors::{ActuatorError, ActuatorResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Duty-cycle output driving the actuator
#[async_trait]
pub trait PwmOutput: Send {
    /// `fraction` is the normalized duty cycle, 0.0 (off) to 1.0 (full)
    async fn set_duty(&mut self, fraction: f32) -> ActuatorResult<()>;
}

/// Linux sysfs PWM channel (`/sys/class/pwm/pwmchipN/pwmM`)
pub struct SysfsPwm {
    dir: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    /// Export the channel if needed, set its period and enable it
    pub async fn open(chip: u32, channel: u32, frequency_hz: u32) -> ActuatorResult<Self> {
        let chip_dir = PathBuf::from(format!("/sys/class/pwm/pwmchip{}", chip));
        let dir = chip_dir.join(format!("pwm{}", channel));
        if tokio::fs::metadata(&dir).await.is_err() {
            write_attr(&chip_dir.join("export"), &channel.to_string()).await?;
        }

        let period_ns = 1_000_000_000 / frequency_hz.max(1) as u64;
        let pwm = Self { dir, period_ns };
        write_attr(&pwm.dir.join("duty_cycle"), "0").await?;
        write_attr(&pwm.dir.join("period"), &period_ns.to_string()).await?;
        write_attr(&pwm.dir.join("enable"), "1").await?;
        info!("[feedback] PWM {} enabled at {} Hz", pwm.dir.display(), frequency_hz);
        Ok(pwm)
    }
}

async fn write_attr(path: &Path, value: &str) -> ActuatorResult<()> {
    tokio::fs::write(path, value)
        .await
        .map_err(|source| ActuatorError::Pwm {
            path: path.display().to_string(),
            source,
        })
}

#[async_trait]
impl PwmOutput for SysfsPwm {
    async fn set_duty(&mut self, fraction: f32) -> ActuatorResult<()> {
        let duty_ns = (self.period_ns as f64 * fraction.clamp(0.0, 1.0) as f64) as u64;
        write_attr(&self.dir.join("duty_cycle"), &duty_ns.to_string()).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Off,
    On,
}

pub struct HapticMotor<P: PwmOutput> {
    output: P,
    state: MotorState,
}

impl<P: PwmOutput> HapticMotor<P> {
    pub fn new(output: P) -> Self {
        Self {
            output,
            state: MotorState::Off,
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Off -> On at `intensity`. No-op when already on.
    pub async fn turn_on(&mut self, intensity: f32) -> ActuatorResult<()> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(ActuatorError::InvalidIntensity(intensity));
        }
        if self.state == MotorState::On {
            return Ok(());
        }
        self.output.set_duty(intensity).await?;
        self.state = MotorState::On;
        debug!("[feedback] motor on at {:.2}", intensity);
        Ok(())
    }

    /// On -> Off. No-op when already off.
    pub async fn turn_off(&mut self) -> ActuatorResult<()> {
        if self.state == MotorState::Off {
            return Ok(());
        }
        self.output.set_duty(0.0).await?;
        self.state = MotorState::Off;
        debug!("[feedback] motor off");
        Ok(())
    }

    /// Hold the motor on for `duration`, then switch it off
    pub async fn activate_for_duration(&mut self, duration: Duration, intensity: f32) -> ActuatorResult<()> {
        self.turn_on(intensity).await?;
        tokio::time::sleep(duration).await;
        self.turn_off().await
    }

    pub fn into_output(self) -> P {
        self.output
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedbackCommand {
    Pulse { duration: Duration, intensity: f32 },
}

/// Sending side of the feedback task
#[derive(Clone)]
pub struct FeedbackHandle {
    tx: mpsc::Sender<FeedbackCommand>,
    duration: Duration,
    intensity: f32,
}

impl FeedbackHandle {
    /// Queue one pulse with the configured duration and intensity.
    ///
    /// Returns false when the pulse was dropped because the queue is full
    /// or the task has stopped.
    pub fn pulse(&self) -> bool {
        self.send(FeedbackCommand::Pulse {
            duration: self.duration,
            intensity: self.intensity,
        })
    }

    pub fn send(&self, command: FeedbackCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("[feedback] pulse already pending, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("[feedback] {}", ActuatorError::TaskClosed);
                false
            }
        }
    }
}

/// Command queue between the polling cycle and whatever drives the motor
pub fn feedback_channel(settings: &FeedbackSettings) -> (FeedbackHandle, mpsc::Receiver<FeedbackCommand>) {
    let (tx, rx) = mpsc::channel(settings.queue_depth.max(1));
    let handle = FeedbackHandle {
        tx,
        duration: settings.duration(),
        intensity: settings.intensity,
    };
    (handle, rx)
}

/// Start the feedback task. It exits, with the motor off, once every handle
/// is dropped, and hands the motor back.
pub fn spawn_feedback_task<P>(
    mut motor: HapticMotor<P>,
    settings: &FeedbackSettings,
) -> (FeedbackHandle, JoinHandle<HapticMotor<P>>)
where
    P: PwmOutput + 'static,
{
    let (handle, mut rx) = feedback_channel(settings);

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                FeedbackCommand::Pulse { duration, intensity } => {
                    if let Err(e) = motor.activate_for_duration(duration, intensity).await {
                        error!("[feedback] pulse failed: {}", e);
                        if let Err(e) = motor.turn_off().await {
                            error!("[feedback] motor may still be on: {}", e);
                        }
                    }
                }
            }
        }
        if let Err(e) = motor.turn_off().await {
            error!("[feedback] failed to stop motor on shutdown: {}", e);
        }
        motor
    });

    (handle, task)
}
