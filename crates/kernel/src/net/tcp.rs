//! TCP header framing and the per-connection state machine, including
//! sequence-number arithmetic, RTT estimation, and congestion control.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use rand::Rng;

use crate::error::NetError;
use crate::net::ipv4::checksum16;

pub const MIN_HEADER_LEN: usize = 20;
pub const PROTOCOL_TCP: u8 = 6;

pub const FLAG_FIN: u8 = 0x01;
pub const FLAG_SYN: u8 = 0x02;
pub const FLAG_RST: u8 = 0x04;
pub const FLAG_PSH: u8 = 0x08;
pub const FLAG_ACK: u8 = 0x10;
pub const FLAG_URG: u8 = 0x20;

pub const DEFAULT_MSS: u32 = 1460;
pub const DEFAULT_WINDOW: u16 = 65535;
pub const INITIAL_SSTHRESH: u32 = 65535;
pub const MIN_RTO: Duration = Duration::from_millis(200);
pub const MAX_RTO: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub ack: u32,
    pub flags: u8,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    pub options: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub header: TcpHeader,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    pub fn parse(bytes: &[u8]) -> Result<Self, NetError> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(NetError::BufferTooSmall {
                needed: MIN_HEADER_LEN,
                got: bytes.len(),
            });
        }
        let data_offset = (bytes[12] >> 4) as usize * 4;
        if data_offset < MIN_HEADER_LEN || bytes.len() < data_offset {
            return Err(NetError::InvalidPacket("bad data offset".to_string()));
        }
        let header = TcpHeader {
            source_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            destination_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            sequence: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ack: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            flags: bytes[13],
            window: u16::from_be_bytes([bytes[14], bytes[15]]),
            checksum: u16::from_be_bytes([bytes[16], bytes[17]]),
            urgent_pointer: u16::from_be_bytes([bytes[18], bytes[19]]),
            options: bytes[20..data_offset].to_vec(),
        };
        Ok(Self {
            header,
            payload: bytes[data_offset..].to_vec(),
        })
    }

    /// Serialize with data offset and pseudo-header checksum recomputed.
    pub fn serialize(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        let header_len = 20 + self.header.options.len();
        let data_offset_words = (header_len / 4) as u8;
        let window = if self.header.window == 0 {
            DEFAULT_WINDOW
        } else {
            self.header.window
        };

        let mut out = Vec::with_capacity(header_len + self.payload.len());
        out.extend_from_slice(&self.header.source_port.to_be_bytes());
        out.extend_from_slice(&self.header.destination_port.to_be_bytes());
        out.extend_from_slice(&self.header.sequence.to_be_bytes());
        out.extend_from_slice(&self.header.ack.to_be_bytes());
        out.push(data_offset_words << 4);
        out.push(self.header.flags);
        out.extend_from_slice(&window.to_be_bytes());
        out.extend_from_slice(&[0, 0]); // checksum placeholder
        out.extend_from_slice(&self.header.urgent_pointer.to_be_bytes());
        out.extend_from_slice(&self.header.options);
        out.extend_from_slice(&self.payload);

        let segment_len = out.len() as u32;
        let mut pseudo = Vec::with_capacity(12 + out.len());
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.push(0);
        pseudo.push(PROTOCOL_TCP);
        pseudo.extend_from_slice(&(segment_len as u16).to_be_bytes());
        pseudo.extend_from_slice(&out);
        let checksum = checksum16(&pseudo);
        out[16..18].copy_from_slice(&checksum.to_be_bytes());
        out
    }
}

/// Signed 32-bit sequence-number comparison: handles wraparound correctly.
pub fn seq_less(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    Closing,
    TimeWait,
    CloseWait,
    LastAck,
}

#[derive(Debug, Clone)]
struct RetransmitEntry {
    payload: Vec<u8>,
    sent_at: std::time::Instant,
}

/// One TCP connection's send/receive state, RTT estimator, congestion
/// control, and retransmit queue.
pub struct Connection {
    pub state: TcpState,
    pub iss: u32,
    pub irs: u32,
    pub snd_una: u32,
    pub snd_next: u32,
    pub snd_wnd: u16,
    pub rcv_next: u32,
    pub rcv_wnd: u16,
    pub mss: u32,
    pub cwnd: u32,
    pub ssthresh: u32,
    pub srtt: Option<Duration>,
    pub rto: Duration,
    retransmit_queue: BTreeMap<u32, RetransmitEntry>,
}

impl Connection {
    pub fn new() -> Self {
        let iss: u32 = rand::thread_rng().gen();
        Self {
            state: TcpState::Closed,
            iss,
            irs: 0,
            snd_una: iss,
            snd_next: iss,
            snd_wnd: DEFAULT_WINDOW,
            rcv_next: 0,
            rcv_wnd: DEFAULT_WINDOW,
            mss: DEFAULT_MSS,
            cwnd: 10 * DEFAULT_MSS,
            ssthresh: INITIAL_SSTHRESH,
            srtt: None,
            rto: MIN_RTO,
            retransmit_queue: BTreeMap::new(),
        }
    }

    pub fn is_state(&self, state: TcpState) -> bool {
        self.state == state
    }

    pub fn is_established(&self) -> bool {
        self.state == TcpState::Established
    }

    /// Record an outbound segment: advances `snd_next` by the payload length
    /// and queues it for retransmission, keyed by the post-advance sequence.
    pub fn send(&mut self, payload: Vec<u8>) -> u32 {
        let key = self.snd_next.wrapping_add(payload.len() as u32);
        self.snd_next = key;
        self.retransmit_queue.insert(
            key,
            RetransmitEntry {
                payload,
                sent_at: std::time::Instant::now(),
            },
        );
        key
    }

    /// Process an incoming ACK. If `snd_una < ack <= snd_next`, evicts every
    /// retransmit-queue entry keyed in `[old snd_una, ack)` and advances
    /// `snd_una` to `ack`. This is the key-range removal prescribed as the
    /// correct fix for the naive per-sequence-unit eviction walk.
    pub fn acknowledge(&mut self, ack: u32) {
        let in_range = seq_less(self.snd_una, ack) && !seq_less(self.snd_next, ack);
        if !in_range {
            return;
        }
        let old_una = self.snd_una;
        // Evict exactly the keys in [old_una, ack): keep everything else.
        self.retransmit_queue
            .retain(|&key, _| !(!seq_less(key, old_una) && seq_less(key, ack)));
        self.snd_una = ack;
    }

    pub fn retransmit_queue_len(&self) -> usize {
        self.retransmit_queue.len()
    }

    pub fn retransmit_queue_keys(&self) -> Vec<u32> {
        self.retransmit_queue.keys().copied().collect()
    }

    /// Jacobson/Karels smoothing with alpha = 1/8, then recompute RTO.
    pub fn update_rtt(&mut self, sample: Duration) {
        self.srtt = Some(match self.srtt {
            None => sample,
            Some(srtt) => (srtt * 7 + sample) / 8,
        });
        let srtt = self.srtt.unwrap();
        let computed = srtt.mul_f64(1.5) + Duration::from_millis(200);
        self.rto = computed.clamp(MIN_RTO, MAX_RTO);
    }

    /// Advance congestion window on an ACK: slow start below threshold,
    /// additive increase (one MSS per RTT, approximated per-ACK here) above.
    pub fn on_ack_congestion_update(&mut self, acked_bytes: u32) {
        if self.cwnd < self.ssthresh {
            self.cwnd += self.mss.min(acked_bytes);
        } else {
            let increment = ((self.mss as u64 * self.mss as u64) / self.cwnd as u64) as u32;
            self.cwnd += increment.max(1);
        }
    }

    /// On a detected loss (RTO fired), halve the flight size into
    /// `ssthresh` and collapse the window to one MSS.
    pub fn on_loss(&mut self, flight_size: u32) {
        self.ssthresh = (flight_size / 2).max(2 * self.mss);
        self.cwnd = self.mss;
    }

    /// Segments whose retransmission timer (RTO, from send time) has elapsed.
    pub fn retransmit_due(&self, now: std::time::Instant) -> Vec<u32> {
        self.retransmit_queue
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.sent_at) >= self.rto)
            .map(|(&key, _)| key)
            .collect()
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_less_handles_wraparound() {
        assert!(seq_less(u32::MAX - 9, 10));
        assert!(seq_less(1, 2));
        assert!(!seq_less(2, 1));
        assert!(!seq_less(5, 5));
    }

    #[test]
    fn seq_less_is_a_transitive_total_order_on_non_wrapping_triples() {
        assert!(seq_less(1, 2) && seq_less(2, 3) && seq_less(1, 3));
    }

    #[test]
    fn acknowledge_collapses_retransmit_queue_scenario_5() {
        let mut conn = Connection::new();
        conn.snd_una = 900;
        conn.snd_next = 1000;
        conn.retransmit_queue.insert(
            920,
            RetransmitEntry {
                payload: vec![],
                sent_at: std::time::Instant::now(),
            },
        );
        conn.retransmit_queue.insert(
            950,
            RetransmitEntry {
                payload: vec![],
                sent_at: std::time::Instant::now(),
            },
        );
        conn.retransmit_queue.insert(
            1000,
            RetransmitEntry {
                payload: vec![],
                sent_at: std::time::Instant::now(),
            },
        );

        conn.acknowledge(950);

        assert_eq!(conn.snd_una, 950);
        let keys = conn.retransmit_queue_keys();
        assert!(!keys.contains(&920));
        assert!(keys.contains(&950));
        assert!(keys.contains(&1000));
    }

    #[test]
    fn acknowledge_outside_window_is_ignored() {
        let mut conn = Connection::new();
        conn.snd_una = 900;
        conn.snd_next = 1000;
        conn.acknowledge(800); // ack <= snd_una
        assert_eq!(conn.snd_una, 900);
        conn.acknowledge(1100); // ack > snd_next
        assert_eq!(conn.snd_una, 900);
    }

    #[test]
    fn rtt_smoothing_uses_jacobson_alpha() {
        let mut conn = Connection::new();
        conn.update_rtt(Duration::from_millis(100));
        assert_eq!(conn.srtt, Some(Duration::from_millis(100)));
        conn.update_rtt(Duration::from_millis(180));
        // (7*100 + 180)/8 = 110
        assert_eq!(conn.srtt, Some(Duration::from_millis(110)));
    }

    #[test]
    fn rto_is_clamped_to_bounds() {
        let mut conn = Connection::new();
        conn.update_rtt(Duration::from_micros(1));
        assert!(conn.rto >= MIN_RTO);
    }

    #[test]
    fn header_serialize_then_parse_roundtrips() {
        let segment = TcpSegment {
            header: TcpHeader {
                source_port: 1234,
                destination_port: 80,
                sequence: 100,
                ack: 200,
                flags: FLAG_SYN | FLAG_ACK,
                window: 0,
                checksum: 0,
                urgent_pointer: 0,
                options: Vec::new(),
            },
            payload: vec![1, 2, 3],
        };
        let bytes = segment.serialize(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let parsed = TcpSegment::parse(&bytes).unwrap();
        assert_eq!(parsed.header.sequence, 100);
        assert_eq!(parsed.header.ack, 200);
        assert_eq!(parsed.header.flags, FLAG_SYN | FLAG_ACK);
        assert_eq!(parsed.header.window, DEFAULT_WINDOW);
        assert_eq!(parsed.payload, vec![1, 2, 3]);
    }

    #[test]
    fn loss_halves_flight_into_ssthresh_and_resets_cwnd() {
        let mut conn = Connection::new();
        conn.on_loss(10000);
        assert_eq!(conn.ssthresh, 5000.max(2 * DEFAULT_MSS));
        assert_eq!(conn.cwnd, DEFAULT_MSS);
    }
}
