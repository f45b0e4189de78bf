//! Longest-chain header tracking
//!
//! [`Lch10Ids`] carries the ids of the ten most recent canonical headers,
//! oldest first, and feeds the parallel proof-of-work hash.
//! [`HeaderChain`] keeps the canonical header list in memory and answers
//! the questions header validation and work issuance need.

use serde::{Deserialize, Serialize};

use super::difficulty::adjustment_block_num;
use super::header::{Header, HeaderError};
use crate::codec::{self, BufError, BufReader, BufWriter, Buf32};

/// Number of recent header ids carried in a work pack
pub const LCH_IDS_LEN: usize = 10;

// =============================================================================
// Lch10Ids
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lch10Ids {
    ids: Vec<Buf32>,
}

impl Lch10Ids {
    pub fn new(ids: Vec<Buf32>) -> Result<Self, BufError> {
        if ids.len() > LCH_IDS_LEN {
            return Err(BufError::TooMany {
                what: "lch ids",
                count: ids.len() as u64,
                max: LCH_IDS_LEN as u64,
            });
        }
        Ok(Self { ids })
    }

    /// Keep the last ten ids of `ids`
    pub fn from_recent(ids: &[Buf32]) -> Self {
        let start = ids.len().saturating_sub(LCH_IDS_LEN);
        Self {
            ids: ids[start..].to_vec(),
        }
    }

    pub fn ids(&self) -> &[Buf32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Newest id first, zero-padded to ten entries
    pub fn reversed_padded(&self) -> [Buf32; LCH_IDS_LEN] {
        let mut out = [Buf32::zero(); LCH_IDS_LEN];
        for (slot, id) in out.iter_mut().zip(self.ids.iter().rev()) {
            *slot = *id;
        }
        out
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        w.write_var_int(self.ids.len() as u64);
        for id in &self.ids {
            w.write_fixed(id);
        }
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        let count = r.read_count(32)?;
        if count > LCH_IDS_LEN {
            return Err(BufError::TooMany {
                what: "lch ids",
                count: count as u64,
                max: LCH_IDS_LEN as u64,
            });
        }
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(r.read_fixed()?);
        }
        Ok(Self { ids })
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let lch = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(lch)
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.to_buf())
    }

    pub fn from_hex(s: &str) -> Result<Self, BufError> {
        Self::from_buf(&codec::from_hex(s)?)
    }
}

// =============================================================================
// HeaderChain
// =============================================================================

/// In-memory canonical header chain starting at a genesis header
#[derive(Debug, Clone)]
pub struct HeaderChain {
    headers: Vec<Header>,
}

impl HeaderChain {
    pub fn new(genesis: Header) -> Self {
        Self {
            headers: vec![genesis],
        }
    }

    pub fn tip(&self) -> &Header {
        // Never empty: constructed with a genesis header and only grows
        &self.headers[self.headers.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.tip().block_num
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn get(&self, block_num: u64) -> Option<&Header> {
        let index = usize::try_from(block_num).ok()?;
        self.headers.get(index)
    }

    /// Header opening the retarget period for a new header at `block_num`
    pub fn adjustment_header(&self, block_num: u64) -> Option<&Header> {
        adjustment_block_num(block_num).and_then(|n| self.get(n))
    }

    pub fn next_target(&self) -> Result<Buf32, HeaderError> {
        let tip = self.tip();
        Header::next_target(tip, self.adjustment_header(tip.block_num + 1))
    }

    /// Unworked header extending the tip
    pub fn new_child(&self, merkle_root: Buf32, timestamp: u64) -> Result<Header, HeaderError> {
        let tip = self.tip();
        let timestamp = timestamp.max(tip.timestamp);
        Header::from_prev(
            tip,
            self.adjustment_header(tip.block_num + 1),
            merkle_root,
            timestamp,
        )
    }

    /// Ids of the most recent headers, oldest first
    pub fn lch10_ids(&self) -> Lch10Ids {
        self.lch10_ids_through(self.height())
    }

    /// Ids of up to ten headers ending with the one at `block_num`
    pub fn lch10_ids_through(&self, block_num: u64) -> Lch10Ids {
        let end = usize::try_from(block_num)
            .map(|n| n.saturating_add(1).min(self.headers.len()))
            .unwrap_or(self.headers.len());
        let start = end.saturating_sub(LCH_IDS_LEN);
        Lch10Ids {
            ids: self.headers[start..end].iter().map(Header::id).collect(),
        }
    }

    /// Check `header` against the tip and append it
    pub fn push(&mut self, header: Header, now: u64) -> Result<(), HeaderError> {
        let tip = self.tip();
        header.res_is_valid_at(tip, self.adjustment_header(header.block_num), now)?;
        log::info!(
            "Header chain extended to {} ({})",
            header.block_num,
            header.id()
        );
        self.headers.push(header);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(len: usize) -> HeaderChain {
        let genesis = Header::genesis(Buf32::zero(), 1_000, Buf32::filled(0xFF));
        let mut chain = HeaderChain::new(genesis);
        for i in 1..len {
            let child = chain
                .new_child(Buf32::filled(i as u8), 1_000 + i as u64 * 600)
                .unwrap();
            let now = child.timestamp;
            chain.push(child, now).unwrap();
        }
        chain
    }

    #[test]
    fn test_lch_ids_limit() {
        assert!(Lch10Ids::new(vec![Buf32::zero(); 10]).is_ok());
        assert!(Lch10Ids::new(vec![Buf32::zero(); 11]).is_err());
    }

    #[test]
    fn test_lch_ids_roundtrip() {
        let lch = Lch10Ids::new((0..4).map(Buf32::filled).collect()).unwrap();
        let buf = lch.to_buf();
        assert_eq!(buf.len(), 1 + 4 * 32);
        assert_eq!(Lch10Ids::from_buf(&buf).unwrap(), lch);
        assert_eq!(Lch10Ids::from_hex(&lch.to_hex()).unwrap(), lch);
    }

    #[test]
    fn test_lch_ids_decode_rejects_eleven() {
        let mut buf = vec![11u8];
        buf.extend(std::iter::repeat(0u8).take(11 * 32));
        assert!(matches!(
            Lch10Ids::from_buf(&buf),
            Err(BufError::TooMany { count: 11, .. })
        ));
        assert!(Lch10Ids::from_buf(&[2u8; 40]).is_err());
    }

    #[test]
    fn test_reversed_padded() {
        let lch = Lch10Ids::new(vec![Buf32::filled(1), Buf32::filled(2)]).unwrap();
        let out = lch.reversed_padded();
        assert_eq!(out[0], Buf32::filled(2));
        assert_eq!(out[1], Buf32::filled(1));
        assert!(out[2..].iter().all(Buf32::is_zero));
    }

    #[test]
    fn test_from_recent_keeps_last_ten() {
        let ids: Vec<Buf32> = (0..15).map(Buf32::filled).collect();
        let lch = Lch10Ids::from_recent(&ids);
        assert_eq!(lch.len(), 10);
        assert_eq!(lch.ids()[0], Buf32::filled(5));
        assert_eq!(lch.ids()[9], Buf32::filled(14));
    }

    #[test]
    fn test_chain_push_and_lookup() {
        let chain = chain_of(5);
        assert_eq!(chain.len(), 5);
        assert_eq!(chain.height(), 4);
        assert_eq!(chain.get(2).unwrap().block_num, 2);
        assert!(chain.get(5).is_none());
        assert_eq!(chain.tip().prev_block_id, chain.get(3).unwrap().id());
    }

    #[test]
    fn test_chain_rejects_bad_header() {
        let mut chain = chain_of(2);
        let mut bad = chain.new_child(Buf32::zero(), 5_000).unwrap();
        bad.block_num += 1;
        assert!(chain.push(bad, 5_000).is_err());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_chain_lch10_ids() {
        let short = chain_of(3);
        let lch = short.lch10_ids();
        assert_eq!(lch.len(), 3);
        assert_eq!(lch.ids()[0], short.get(0).unwrap().id());

        let long = chain_of(12);
        let lch = long.lch10_ids();
        assert_eq!(lch.len(), 10);
        assert_eq!(lch.ids()[0], long.get(2).unwrap().id());
        assert_eq!(lch.ids()[9], long.tip().id());

        let mid = long.lch10_ids_through(4);
        assert_eq!(mid.len(), 5);
        assert_eq!(mid.ids()[4], long.get(4).unwrap().id());
    }

    fn chain_with_spacing(len: u64, spacing: u64, target: Buf32) -> HeaderChain {
        let genesis = Header::genesis(Buf32::zero(), 1_000, target);
        let mut chain = HeaderChain::new(genesis);
        for i in 1..len {
            let child = chain
                .new_child(Buf32::filled(i as u8), 1_000 + i * spacing)
                .unwrap();
            let now = child.timestamp;
            chain.push(child, now).unwrap();
        }
        chain
    }

    #[test]
    fn test_chain_retarget_fast_period_clamped() {
        use crate::core::difficulty::{target_to_u256, u256_to_target, RETARGET_PERIOD};
        use crate::core::target_with_leading_zeros;

        let old = target_with_leading_zeros(20);
        // One second per block: far faster than a quarter of the expected period
        let mut chain = chain_with_spacing(RETARGET_PERIOD, 1, old);
        assert_eq!(chain.height(), RETARGET_PERIOD - 1);
        assert_eq!(chain.tip().target, old);

        let child = chain.new_child(Buf32::filled(1), chain.tip().timestamp + 1).unwrap();
        let expected = u256_to_target(target_to_u256(&old) / 4);
        assert_eq!(child.block_num, RETARGET_PERIOD);
        assert_eq!(child.target, expected);

        // Keeping the old target at the boundary is refused
        let mut stale = child.clone();
        stale.target = old;
        assert_eq!(
            chain.push(stale, child.timestamp),
            Err(HeaderError::TargetMismatch)
        );

        let now = child.timestamp;
        chain.push(child, now).unwrap();
        let next = chain.new_child(Buf32::filled(2), now + 1).unwrap();
        assert_eq!(next.target, expected);
        chain.push(next, now + 1).unwrap();
        assert_eq!(chain.height(), RETARGET_PERIOD + 1);
    }

    #[test]
    fn test_chain_retarget_slow_period_clamped() {
        use crate::core::difficulty::{target_to_u256, u256_to_target, RETARGET_PERIOD};
        use crate::core::target_with_leading_zeros;

        let old = target_with_leading_zeros(20);
        // Ten times slower than scheduled; growth is capped at four
        let mut chain = chain_with_spacing(RETARGET_PERIOD, 6_000, old);
        let now = chain.tip().timestamp + 600;
        let child = chain.new_child(Buf32::filled(1), now).unwrap();
        assert_eq!(child.target, u256_to_target(target_to_u256(&old) * 4));
        chain.push(child, now).unwrap();
    }

    #[test]
    fn test_adjustment_header_lookup() {
        let chain = chain_of(3);
        assert!(chain.adjustment_header(1).is_none());
        assert!(chain.adjustment_header(2016).is_some());
        assert_eq!(chain.next_target().unwrap(), chain.tip().target);
    }
}
