//! UDP header/datagram with pseudo-header checksum.

use std::net::Ipv4Addr;

use crate::error::NetError;
use crate::net::ipv4::checksum16;

pub const HEADER_LEN: usize = 8;
pub const PROTOCOL_UDP: u8 = 17;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpDatagram {
    pub source_port: u16,
    pub destination_port: u16,
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl UdpDatagram {
    pub fn parse(bytes: &[u8]) -> Result<Self, NetError> {
        if bytes.len() < HEADER_LEN {
            return Err(NetError::BufferTooSmall {
                needed: HEADER_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            source_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            destination_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            checksum: u16::from_be_bytes([bytes[6], bytes[7]]),
            payload: bytes[8..].to_vec(),
        })
    }

    /// Serialize with length and pseudo-header checksum recomputed.
    pub fn serialize(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        let length = (HEADER_LEN + self.payload.len()) as u16;
        let mut out = Vec::with_capacity(length as usize);
        out.extend_from_slice(&self.source_port.to_be_bytes());
        out.extend_from_slice(&self.destination_port.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&[0, 0]); // checksum placeholder
        out.extend_from_slice(&self.payload);

        let mut pseudo = Vec::with_capacity(12 + out.len());
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.push(0);
        pseudo.push(PROTOCOL_UDP);
        pseudo.extend_from_slice(&length.to_be_bytes());
        pseudo.extend_from_slice(&out);
        let checksum = checksum16(&pseudo);
        out[6..8].copy_from_slice(&checksum.to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_sets_length_and_checksum() {
        let datagram = UdpDatagram {
            source_port: 53,
            destination_port: 12345,
            checksum: 0,
            payload: vec![1, 2, 3, 4],
        };
        let bytes = datagram.serialize(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(bytes.len(), HEADER_LEN + 4);
        let length = u16::from_be_bytes([bytes[4], bytes[5]]);
        assert_eq!(length, 12);
        let parsed = UdpDatagram::parse(&bytes).unwrap();
        assert_eq!(parsed.payload, vec![1, 2, 3, 4]);
        assert_ne!(parsed.checksum, 0);
    }
}
