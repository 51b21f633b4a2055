//! Packet sorter
//!
//! Sits between the radio and the application buffers:
//!
//! * inbound, fragments accepted from the air are checked against a
//!   per-source fingerprint window (duplicates from retransmissions or
//!   overheard relays are dropped silently) and their payloads collected
//!   into per-source byte streams for the application to read;
//! * outbound, whole packets queue up per destination until the slotter
//!   says it is that destination's turn on the air.
//!
//! All queues are bounded; writers are told how much was accepted and
//! nothing ever blocks.

use crate::address::Addr;
use crate::fragment::{Fingerprint, Fragment, PAYLOAD_MAX};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Capacity limits for one sorter.
#[derive(Debug, Clone, Copy)]
pub struct SorterConfig {
    /// Fragments' worth of bytes one inbound stream can hold; also the
    /// length of each source's fingerprint window.
    pub stream_size_max: usize,
    /// How many sources can have live inbound streams at once.
    pub stream_count_max: usize,
    /// Outbound queue depth.
    pub send_count_max: usize,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            stream_size_max: 6,
            stream_count_max: 2,
            send_count_max: 6,
        }
    }
}

/// Reassembled inbound bytes from one source.
#[derive(Debug)]
struct Stream {
    src: Addr,
    data: VecDeque<u8>,
    seen: VecDeque<Fingerprint>,
}

impl Stream {
    fn new(src: Addr) -> Self {
        Self {
            src,
            data: VecDeque::new(),
            seen: VecDeque::new(),
        }
    }
}

/// Bounded inbound/outbound packet buffering with duplicate suppression.
#[derive(Debug)]
pub struct PacketSorter {
    config: SorterConfig,
    streams: Vec<Stream>,
    outbound: VecDeque<(Addr, Fragment)>,
}

impl Default for PacketSorter {
    fn default() -> Self {
        Self::new(SorterConfig::default())
    }
}

impl PacketSorter {
    pub fn new(config: SorterConfig) -> Self {
        Self {
            config,
            streams: Vec::new(),
            outbound: VecDeque::new(),
        }
    }

    /// Offer an inbound fragment. Returns `false` when the fragment is a
    /// duplicate, when no stream slot is free for a new source, or when
    /// the source's stream cannot hold the whole payload; fragments are
    /// accepted atomically or not at all.
    pub fn accept(&mut self, fragment: &Fragment) -> bool {
        let print = fragment.fingerprint();
        let capacity = self.stream_capacity();
        let Some(idx) = self.stream_index(fragment.src()) else {
            debug!(src = %fragment.src(), "no stream slot free, fragment dropped");
            return false;
        };
        let stream = &mut self.streams[idx];
        if stream.seen.contains(&print) {
            trace!(src = %fragment.src(), seq = fragment.seq(), "duplicate fragment dropped");
            return false;
        }
        let free = capacity - stream.data.len();
        if fragment.payload().len() > free {
            debug!(src = %fragment.src(), "stream full, fragment dropped");
            return false;
        }
        if stream.seen.len() == self.config.stream_size_max {
            stream.seen.pop_front();
        }
        stream.seen.push_back(print);
        stream.data.extend(fragment.payload().iter().copied());
        true
    }

    /// Append raw bytes to a source's stream, bypassing duplicate checks.
    /// Returns the bytes accepted, never more than the stream's free
    /// capacity.
    pub fn write_bytes(&mut self, src: Addr, data: &[u8]) -> usize {
        let capacity = self.stream_capacity();
        let Some(idx) = self.stream_index(src) else {
            return 0;
        };
        let stream = &mut self.streams[idx];
        let free = capacity - stream.data.len();
        let accepted = data.len().min(free);
        stream.data.extend(data[..accepted].iter().copied());
        accepted
    }

    /// Drain bytes from the next ready inbound stream into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(stream) = self.streams.iter_mut().find(|s| !s.data.is_empty()) else {
            return 0;
        };
        let mut copied = 0;
        while copied < buf.len() {
            match stream.data.pop_front() {
                Some(byte) => {
                    buf[copied] = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        copied
    }

    /// Bytes waiting in the next ready inbound stream.
    pub fn data_available(&self) -> usize {
        self.streams
            .iter()
            .find(|s| !s.data.is_empty())
            .map_or(0, |s| s.data.len())
    }

    /// Source of the next ready inbound stream.
    pub fn data_from_addr(&self) -> Option<Addr> {
        self.streams
            .iter()
            .find(|s| !s.data.is_empty())
            .map(|s| s.src)
    }

    /// Queue an outbound packet for `dst`. `false` when the queue is full.
    pub fn write_packet(&mut self, dst: Addr, fragment: Fragment) -> bool {
        if self.outbound.len() >= self.config.send_count_max {
            debug!(%dst, "outbound queue full, packet rejected");
            return false;
        }
        self.outbound.push_back((dst, fragment));
        true
    }

    /// Dequeue the next outbound packet bound for `destination`, leaving
    /// packets for other destinations in order.
    pub fn get_packet(&mut self, destination: Addr) -> Option<Fragment> {
        let idx = self
            .outbound
            .iter()
            .position(|(dst, _)| *dst == destination)?;
        self.outbound.remove(idx).map(|(_, fragment)| fragment)
    }

    /// Outbound packets waiting, all destinations.
    pub fn packets_available(&self) -> usize {
        self.outbound.len()
    }

    fn stream_capacity(&self) -> usize {
        self.config.stream_size_max * PAYLOAD_MAX
    }

    /// Find the stream for `src`, creating one if a slot is free or a
    /// drained slot can be recycled.
    fn stream_index(&mut self, src: Addr) -> Option<usize> {
        if let Some(idx) = self.streams.iter().position(|s| s.src == src) {
            return Some(idx);
        }
        if self.streams.len() < self.config.stream_count_max {
            self.streams.push(Stream::new(src));
            return Some(self.streams.len() - 1);
        }
        // recycle the oldest fully drained slot
        if let Some(idx) = self.streams.iter().position(|s| s.data.is_empty()) {
            self.streams[idx] = Stream::new(src);
            return Some(idx);
        }
        None
    }
}
