//! Protobuf payload schema for log frames.
//!
//! ```text
//! DataPoint { uint64 timestamp = 1; CPU cpu = 2; Memory memory = 3;
//!             repeated Disk disks = 4; Network network = 5; }
//! CPU       { repeated uint32 load = 1; }  // packed
//! Memory    { uint64 used = 1; uint64 free = 2; }
//! Disk      { string name = 1; uint64 read_speed = 2; uint64 write_speed = 3; }
//! Network   { uint64 bytes_sent = 1; uint64 bytes_received = 2; }
//! ```
//!
//! Tags and field types are fixed: existing logs must keep decoding.

use crate::storage::model::{DiskIo, MemoryUsage, NetworkIo, TelemetryRecord};

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct DataPoint {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(message, optional, tag = "2")]
    pub cpu: Option<Cpu>,
    #[prost(message, optional, tag = "3")]
    pub memory: Option<Memory>,
    #[prost(message, repeated, tag = "4")]
    pub disks: Vec<Disk>,
    #[prost(message, optional, tag = "5")]
    pub network: Option<Network>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct Cpu {
    #[prost(uint32, repeated, tag = "1")]
    pub load: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct Memory {
    #[prost(uint64, tag = "1")]
    pub used: u64,
    #[prost(uint64, tag = "2")]
    pub free: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct Disk {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint64, tag = "2")]
    pub read_speed: u64,
    #[prost(uint64, tag = "3")]
    pub write_speed: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct Network {
    #[prost(uint64, tag = "1")]
    pub bytes_sent: u64,
    #[prost(uint64, tag = "2")]
    pub bytes_received: u64,
}

impl From<&TelemetryRecord> for DataPoint {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            cpu: Some(Cpu {
                load: record.cpu_load.clone(),
            }),
            memory: Some(Memory {
                used: record.memory.used,
                free: record.memory.free,
            }),
            disks: record
                .disks
                .iter()
                .map(|d| Disk {
                    name: d.name.clone(),
                    read_speed: d.read_bytes,
                    write_speed: d.write_bytes,
                })
                .collect(),
            network: Some(Network {
                bytes_sent: record.network.bytes_sent,
                bytes_received: record.network.bytes_received,
            }),
        }
    }
}

impl From<DataPoint> for TelemetryRecord {
    /// Absent sub-messages become zero values.
    fn from(point: DataPoint) -> Self {
        let memory = point.memory.unwrap_or_default();
        let network = point.network.unwrap_or_default();
        Self {
            timestamp: point.timestamp,
            cpu_load: point.cpu.map(|c| c.load).unwrap_or_default(),
            memory: MemoryUsage {
                used: memory.used,
                free: memory.free,
            },
            disks: point
                .disks
                .into_iter()
                .map(|d| DiskIo {
                    name: d.name,
                    read_bytes: d.read_speed,
                    write_bytes: d.write_speed,
                })
                .collect(),
            network: NetworkIo {
                bytes_sent: network.bytes_sent,
                bytes_received: network.bytes_received,
            },
        }
    }
}
