//! Live capture of return traffic on the internet-facing interface
//! (`kale::Sniffer` in the reference), filtered down to the segments the
//! relay itself originated from the reserved port range.

use pcap::{Active, Capture, Device, Linktype};

/// Link-layer preamble length to skip to reach the IPv4 header, keyed by
/// the capture handle's reported datalink type (`FindIPPacket` in the
/// reference).
fn preamble_len(linktype: Linktype) -> Option<usize> {
    match linktype.0 {
        1 => Some(14),   // DLT_EN10MB
        113 => Some(16), // DLT_LINUX_SLL
        8 | 9 => Some(24), // DLT_SLIP, DLT_PPP
        0 => Some(4),    // DLT_NULL
        _ => None,
    }
}

pub struct Sniffer {
    capture: Capture<Active>,
    linktype: Linktype,
}

impl Sniffer {
    pub fn open(ifname: &str, filter_expr: &str) -> Result<Self, pcap::Error> {
        let device = Device::list()?
            .into_iter()
            .find(|d| d.name == ifname)
            .ok_or_else(|| pcap::Error::PcapError(format!("no such device: {ifname}")))?;
        let mut capture = Capture::from_device(device)?
            .promisc(true)
            .snaplen(65536)
            .timeout(1)
            .immediate_mode(true)
            .open()?;
        capture.filter(filter_expr, true)?;
        let linktype = capture.get_datalink();
        Ok(Self { capture, linktype })
    }

    /// Return the next captured frame's IPv4 payload, stripped of its
    /// link-layer preamble. `None` on a read timeout (normal — the caller
    /// just loops and checks its stop flag) or an unrecognized datalink.
    pub fn next_ip_packet(&mut self) -> Option<Vec<u8>> {
        let packet = match self.capture.next_packet() {
            Ok(p) => p,
            Err(pcap::Error::TimeoutExpired) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "capture read failed");
                return None;
            }
        };
        if packet.header.len != packet.header.caplen {
            tracing::warn!(
                len = packet.header.len,
                caplen = packet.header.caplen,
                "ignoring truncated capture frame"
            );
            return None;
        }
        let skip = preamble_len(self.linktype)?;
        if (packet.data.len()) <= skip {
            return None;
        }
        Some(packet.data[skip..].to_vec())
    }
}
