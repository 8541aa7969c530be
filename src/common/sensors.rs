//! Sensor selection declared by agents.
//!
//! An agent returns a [`SensorConfig`] from `Agent::sensor_config`; whoever
//! materializes sensor data reads it to decide which channels and which
//! history frames to load.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A physical sensor channel on the ego vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorChannel {
    #[serde(rename = "CAM_F0")]
    CamF0,
    #[serde(rename = "CAM_L0")]
    CamL0,
    #[serde(rename = "CAM_L1")]
    CamL1,
    #[serde(rename = "CAM_L2")]
    CamL2,
    #[serde(rename = "CAM_R0")]
    CamR0,
    #[serde(rename = "CAM_R1")]
    CamR1,
    #[serde(rename = "CAM_R2")]
    CamR2,
    #[serde(rename = "CAM_B0")]
    CamB0,
    #[serde(rename = "LIDAR_PC")]
    LidarPc,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 9] = [
        Self::CamF0,
        Self::CamL0,
        Self::CamL1,
        Self::CamL2,
        Self::CamR0,
        Self::CamR1,
        Self::CamR2,
        Self::CamB0,
        Self::LidarPc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CamF0 => "CAM_F0",
            Self::CamL0 => "CAM_L0",
            Self::CamL1 => "CAM_L1",
            Self::CamL2 => "CAM_L2",
            Self::CamR0 => "CAM_R0",
            Self::CamR1 => "CAM_R1",
            Self::CamR2 => "CAM_R2",
            Self::CamB0 => "CAM_B0",
            Self::LidarPc => "LIDAR_PC",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which history frames of which channels an agent needs.
///
/// A channel that is absent (or mapped to an empty list) is not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    channels: BTreeMap<SensorChannel, Vec<usize>>,
}

impl SensorConfig {
    /// Request every channel at the given history indices.
    pub fn build_all_sensors(include: Vec<usize>) -> Self {
        Self {
            channels: SensorChannel::ALL
                .iter()
                .map(|c| (*c, include.clone()))
                .collect(),
        }
    }

    /// Request no sensor data at all (ego status only).
    pub fn build_no_sensors() -> Self {
        Self::default()
    }

    /// Request one channel at the given history indices.
    pub fn with_channel(mut self, channel: SensorChannel, include: Vec<usize>) -> Self {
        if include.is_empty() {
            self.channels.remove(&channel);
        } else {
            self.channels.insert(channel, include);
        }
        self
    }

    /// Channels with at least one requested frame, in stable order.
    pub fn enabled_channels(&self) -> Vec<SensorChannel> {
        self.channels
            .iter()
            .filter(|(_, frames)| !frames.is_empty())
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn frames(&self, channel: SensorChannel) -> &[usize] {
        self.channels
            .get(&channel)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the frame of `channel` at `history_index` should be loaded.
    pub fn admits(&self, channel: SensorChannel, history_index: usize) -> bool {
        self.frames(channel).contains(&history_index)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled_channels().is_empty()
    }
}
