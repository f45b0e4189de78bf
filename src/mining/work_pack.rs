//! Work pack: a header to mine plus the recent header ids it depends on

use serde::{Deserialize, Serialize};

use crate::codec::{self, BufError, BufReader, BufWriter};
use crate::core::{Header, Lch10Ids};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPack {
    pub header: Header,
    pub lch10_ids: Lch10Ids,
}

impl WorkPack {
    pub fn new(header: Header, lch10_ids: Lch10Ids) -> Self {
        Self { header, lch10_ids }
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        self.header.write_to(w);
        self.lch10_ids.write_to(w);
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        let header = Header::read_from(r)?;
        let lch10_ids = Lch10Ids::read_from(r)?;
        Ok(Self::new(header, lch10_ids))
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let pack = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(pack)
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.to_buf())
    }

    pub fn from_hex(s: &str) -> Result<Self, BufError> {
        Self::from_buf(&codec::from_hex(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buf32;
    use crate::core::HEADER_SIZE;

    fn pack() -> WorkPack {
        let header = Header::genesis(Buf32::filled(1), 42, Buf32::filled(0x0F));
        let lch = Lch10Ids::new(vec![Buf32::filled(2), Buf32::filled(3)]).unwrap();
        WorkPack::new(header, lch)
    }

    #[test]
    fn test_work_pack_roundtrip() {
        let p = pack();
        let buf = p.to_buf();
        assert_eq!(buf.len(), HEADER_SIZE + 1 + 64);
        assert_eq!(WorkPack::from_buf(&buf).unwrap(), p);
        assert_eq!(WorkPack::from_hex(&p.to_hex()).unwrap(), p);
    }

    #[test]
    fn test_work_pack_truncated() {
        let buf = pack().to_buf();
        assert!(WorkPack::from_buf(&buf[..HEADER_SIZE]).is_err());
        assert!(WorkPack::from_buf(&buf[..buf.len() - 1]).is_err());
    }

    #[test]
    fn test_work_pack_json() {
        let p = pack();
        let json = serde_json::to_string(&p).unwrap();
        let back: WorkPack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
