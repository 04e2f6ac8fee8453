use crate::angle::{AngleEstimator, AngleSample};
use crate::bus::i2c::I2CBus;
use crate::bus::{self, BoundedBus, Channel, Multiplexer, MuxedBus, SharedBus};
use crate::config::{BusSettings, HubConfig};
use crate::errors::{RegistryError, RegistryResult, SensorError, SensorResult};
use crate::filter::TripletFilter;
use crate::sensors::{create_sensor_driver, SensorDriver, SensorReading};
use crate::types::Joint;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Open the configured I2C bus and put the multiplexer in front of it
pub fn open_bus(settings: &BusSettings) -> RegistryResult<SharedBus> {
    let i2c = I2CBus::new(&settings.path).map_err(RegistryError::BusInitError)?;
    info!("[registry] opened I2C bus {}", i2c.path());
    let bounded = BoundedBus::new(Box::new(i2c), settings.timeout());
    Ok(bus::shared(MuxedBus::new(bounded, Multiplexer::new(settings.mux_address))))
}

/// A sensor that passed initialization, with its filter state
pub struct SensorHandle {
    joint: Joint,
    channel: Channel,
    driver: Box<dyn SensorDriver + Send>,
    gyro_filter: TripletFilter,
    accel_filter: TripletFilter,
}

impl SensorHandle {
    pub fn joint(&self) -> Joint {
        self.joint
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}

enum Slot {
    Active(SensorHandle),
    /// Failed identification at startup; never retried
    Excluded { joint: Joint, reason: SensorError },
}

impl Slot {
    fn joint(&self) -> Joint {
        match self {
            Slot::Active(h) => h.joint,
            Slot::Excluded { joint, .. } => *joint,
        }
    }
}

/// Outcome of reading one joint during a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum JointReading {
    Fresh(AngleSample),
    /// Select or read failed this cycle; no fresh data
    Stale(SensorError),
    /// Sensor was dropped at startup
    Excluded,
}

impl JointReading {
    pub fn sample(&self) -> Option<AngleSample> {
        match self {
            JointReading::Fresh(sample) => Some(*sample),
            _ => None,
        }
    }
}

/// All joint readings of one pass, in configured order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayReading {
    pub readings: Vec<(Joint, JointReading)>,
}

impl ArrayReading {
    pub fn get(&self, joint: Joint) -> Option<&JointReading> {
        self.readings.iter().find(|(j, _)| *j == joint).map(|(_, r)| r)
    }

    pub fn sample(&self, joint: Joint) -> Option<AngleSample> {
        self.get(joint).and_then(JointReading::sample)
    }

    pub fn stale(&self) -> impl Iterator<Item = (Joint, &SensorError)> {
        self.readings.iter().filter_map(|(j, r)| match r {
            JointReading::Stale(e) => Some((*j, e)),
            _ => None,
        })
    }
}

/// Registry of every configured joint's sensor, keyed by joint.
///
/// All bus access goes through the shared bus lock. Selecting a channel,
/// waiting for it to settle and reading the sensor happen under one guard.
pub struct SensorArray {
    bus: SharedBus,
    slots: Vec<Slot>,
    estimator: AngleEstimator,
    settle_delay: Duration,
}

impl SensorArray {
    /// Create and initialize one driver per configured joint.
    ///
    /// A sensor that fails to wake or identify is excluded and logged; the
    /// rest of the array is unaffected. Only an unknown driver name or an
    /// array with no working sensor at all is an error.
    pub async fn init(bus: SharedBus, config: &HubConfig) -> RegistryResult<Self> {
        let settle_delay = config.sampling.settle_delay();
        let mut slots = Vec::with_capacity(config.joints.len());

        info!("[registry] initializing {} sensors...", config.joints.len());
        for entry in &config.joints {
            let mut driver = create_sensor_driver(&entry.driver, entry.name.to_string(), entry.address)
                .map_err(RegistryError::DriverCreationError)?;
            debug!(
                "[registry] registering sensor: joint={} driver={} channel={}",
                entry.name, entry.driver, entry.channel
            );

            let result = {
                let mut guard = bus.lock().await;
                match guard.select(entry.channel as i32).await {
                    Ok(channel) => {
                        tokio::time::sleep(settle_delay).await;
                        driver.init(guard.transport()).await.map(|_| channel)
                    }
                    Err(e) => Err(e),
                }
            };

            match result {
                Ok(channel) => {
                    info!("[registry] {} ready on {}", entry.name, channel);
                    slots.push(Slot::Active(SensorHandle {
                        joint: entry.name,
                        channel,
                        driver,
                        gyro_filter: TripletFilter::new(config.sampling.filter_window),
                        accel_filter: TripletFilter::new(config.sampling.filter_window),
                    }));
                }
                Err(reason) => {
                    warn!("[registry] excluding {}: {}", entry.name, reason);
                    slots.push(Slot::Excluded { joint: entry.name, reason });
                }
            }
        }

        if !slots.iter().any(|s| matches!(s, Slot::Active(_))) {
            return Err(RegistryError::NoSensors);
        }

        Ok(Self {
            bus,
            slots,
            estimator: AngleEstimator::new(config.sampling.angle_scale_factor),
            settle_delay,
        })
    }

    pub fn joints(&self) -> impl Iterator<Item = Joint> + '_ {
        self.slots.iter().map(Slot::joint)
    }

    pub fn active_joints(&self) -> impl Iterator<Item = Joint> + '_ {
        self.slots.iter().filter_map(|s| match s {
            Slot::Active(h) => Some(h.joint),
            Slot::Excluded { .. } => None,
        })
    }

    /// Joints dropped at startup, with the reason
    pub fn excluded(&self) -> impl Iterator<Item = (Joint, &SensorError)> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Excluded { joint, reason } => Some((*joint, reason)),
            Slot::Active(_) => None,
        })
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// Read every joint once, in configured order.
    ///
    /// A failure on one joint marks only that joint stale.
    pub async fn read_all(&mut self) -> ArrayReading {
        let mut readings = Vec::with_capacity(self.slots.len());

        for slot in self.slots.iter_mut() {
            let reading = match slot {
                Slot::Excluded { joint, .. } => (*joint, JointReading::Excluded),
                Slot::Active(handle) => {
                    let result =
                        read_rate(&self.bus, handle, self.settle_delay, Measurement::Gyroscope).await;
                    match result {
                        Ok(rate) => {
                            let filtered = handle.gyro_filter.apply(rate);
                            let angle = self.estimator.estimate_triplet(filtered);
                            (handle.joint, JointReading::Fresh(angle))
                        }
                        Err(e) => {
                            warn!("[{}] no fresh data this cycle: {}", handle.joint, e);
                            (handle.joint, JointReading::Stale(e))
                        }
                    }
                }
            };
            readings.push(reading);
        }

        ArrayReading { readings }
    }

    /// Filtered acceleration (m/s²) of one joint
    pub async fn read_acceleration(&mut self, joint: Joint) -> Option<SensorResult<SensorReading>> {
        let handle = self.slots.iter_mut().find_map(|s| match s {
            Slot::Active(h) if h.joint == joint => Some(h),
            _ => None,
        })?;
        let result = read_rate(&self.bus, handle, self.settle_delay, Measurement::Acceleration).await;
        Some(result.map(|accel| handle.accel_filter.apply(accel)))
    }
}

#[derive(Clone, Copy)]
enum Measurement {
    Gyroscope,
    Acceleration,
}

async fn read_rate(
    bus: &SharedBus,
    handle: &SensorHandle,
    settle_delay: Duration,
    measurement: Measurement,
) -> SensorResult<SensorReading> {
    let mut guard = bus.lock().await;
    guard.select(handle.channel.index() as i32).await?;
    tokio::time::sleep(settle_delay).await;
    match measurement {
        Measurement::Gyroscope => handle.driver.read_gyroscope(guard.transport()).await,
        Measurement::Acceleration => handle.driver.read_acceleration(guard.transport()).await,
    }
}
