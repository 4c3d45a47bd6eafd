//! ARP packets and the ARP table.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};

use crate::error::NetError;

pub const PACKET_LEN: usize = 28;

pub const OP_REQUEST: u16 = 1;
pub const OP_REPLY: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_size: u8,
    pub protocol_size: u8,
    pub operation: u16,
    pub sender_mac: [u8; 6],
    pub sender_ip: Ipv4Addr,
    pub target_mac: [u8; 6],
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn request(sender_mac: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            hardware_type: 1,
            protocol_type: 0x0800,
            hardware_size: 6,
            protocol_size: 4,
            operation: OP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: [0u8; 6],
            target_ip,
        }
    }

    pub fn reply(request: &ArpPacket, responder_mac: [u8; 6]) -> Self {
        Self {
            hardware_type: request.hardware_type,
            protocol_type: request.protocol_type,
            hardware_size: request.hardware_size,
            protocol_size: request.protocol_size,
            operation: OP_REPLY,
            sender_mac: responder_mac,
            sender_ip: request.target_ip,
            target_mac: request.sender_mac,
            target_ip: request.sender_ip,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, NetError> {
        if bytes.len() < PACKET_LEN {
            return Err(NetError::BufferTooSmall {
                needed: PACKET_LEN,
                got: bytes.len(),
            });
        }
        let mut sender_mac = [0u8; 6];
        sender_mac.copy_from_slice(&bytes[8..14]);
        let mut target_mac = [0u8; 6];
        target_mac.copy_from_slice(&bytes[18..24]);
        Ok(Self {
            hardware_type: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_type: u16::from_be_bytes([bytes[2], bytes[3]]),
            hardware_size: bytes[4],
            protocol_size: bytes[5],
            operation: u16::from_be_bytes([bytes[6], bytes[7]]),
            sender_mac,
            sender_ip: Ipv4Addr::new(bytes[14], bytes[15], bytes[16], bytes[17]),
            target_mac,
            target_ip: Ipv4Addr::new(bytes[24], bytes[25], bytes[26], bytes[27]),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PACKET_LEN);
        out.extend_from_slice(&self.hardware_type.to_be_bytes());
        out.extend_from_slice(&self.protocol_type.to_be_bytes());
        out.push(self.hardware_size);
        out.push(self.protocol_size);
        out.extend_from_slice(&self.operation.to_be_bytes());
        out.extend_from_slice(&self.sender_mac);
        out.extend_from_slice(&self.sender_ip.octets());
        out.extend_from_slice(&self.target_mac);
        out.extend_from_slice(&self.target_ip.octets());
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpEntryState {
    Incomplete,
    Reachable,
    Stale,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: ArpEntryState,
}

/// Maps IPv4 addresses to MAC addresses with lifecycle state.
#[derive(Default)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, ArpEntry>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Result<[u8; 6], NetError> {
        self.entries
            .get(&ip)
            .map(|e| e.mac)
            .ok_or(NetError::ArpNotFound)
    }

    /// Upsert an entry, marking it Reachable.
    pub fn set(&mut self, ip: Ipv4Addr, mac: [u8; 6]) {
        let now = Utc::now();
        self.entries
            .entry(ip)
            .and_modify(|e| {
                e.mac = mac;
                e.updated_at = now;
                e.state = ArpEntryState::Reachable;
            })
            .or_insert(ArpEntry {
                mac,
                ip,
                created_at: now,
                updated_at: now,
                state: ArpEntryState::Reachable,
            });
    }

    pub fn mark_incomplete(&mut self, ip: Ipv4Addr) {
        let now = Utc::now();
        self.entries.entry(ip).or_insert(ArpEntry {
            mac: [0u8; 6],
            ip,
            created_at: now,
            updated_at: now,
            state: ArpEntryState::Incomplete,
        });
    }

    pub fn mark_failed(&mut self, ip: Ipv4Addr) {
        if let Some(entry) = self.entries.get_mut(&ip) {
            entry.state = ArpEntryState::Failed;
        }
    }

    pub fn mark_stale(&mut self, ip: Ipv4Addr) {
        if let Some(entry) = self.entries.get_mut(&ip) {
            entry.state = ArpEntryState::Stale;
        }
    }

    pub fn state_of(&self, ip: Ipv4Addr) -> Option<ArpEntryState> {
        self.entries.get(&ip).map(|e| e.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_then_reply_roundtrip() {
        let req = ArpPacket::request([1, 2, 3, 4, 5, 6], Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let bytes = req.serialize();
        assert_eq!(bytes.len(), PACKET_LEN);
        let parsed = ArpPacket::parse(&bytes).unwrap();
        assert_eq!(parsed, req);

        let reply = ArpPacket::reply(&req, [9, 9, 9, 9, 9, 9]);
        assert_eq!(reply.operation, OP_REPLY);
        assert_eq!(reply.sender_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(reply.target_ip, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn set_then_lookup_finds_mac() {
        let mut table = ArpTable::new();
        let ip = Ipv4Addr::new(192, 168, 1, 1);
        table.set(ip, [1, 1, 1, 1, 1, 1]);
        assert_eq!(table.lookup(ip).unwrap(), [1, 1, 1, 1, 1, 1]);
        assert_eq!(table.state_of(ip), Some(ArpEntryState::Reachable));
    }

    #[test]
    fn lookup_miss_is_not_found() {
        let table = ArpTable::new();
        assert!(table.lookup(Ipv4Addr::new(1, 1, 1, 1)).is_err());
    }
}
