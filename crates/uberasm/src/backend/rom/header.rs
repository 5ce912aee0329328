//! SNES internal ROM header
//!
//! The header sits at the end of the first bank: `0x7FC0` for LoROM images,
//! `0xFFC0` for HiROM images. A header is recognized when its checksum and
//! checksum complement add up to `0xFFFF`.

/// Memory mapping implied by the header location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    LoRom,
    HiRom,
}

impl Mapping {
    pub fn header_offset(self) -> usize {
        match self {
            Mapping::LoRom => 0x7FC0,
            Mapping::HiRom => 0xFFC0,
        }
    }
}

/// SNES internal header (bytes `0x00-0x1F` relative to its offset)
#[derive(Debug, Clone)]
pub struct InternalHeader {
    pub mapping: Mapping,
    /// Game title, 21 bytes, space padded
    pub title: String,
    pub map_mode: u8,
    pub complement: u16,
    pub checksum: u16,
}

impl InternalHeader {
    pub const TITLE_LEN: usize = 21;
    pub const MAP_MODE_OFFSET: usize = 0x15;
    pub const COMPLEMENT_OFFSET: usize = 0x1C;
    pub const CHECKSUM_OFFSET: usize = 0x1E;
    pub const SIZE: usize = 0x20;

    /// Find a valid header in a ROM body, trying LoROM before HiROM
    pub fn locate(body: &[u8]) -> Option<Self> {
        [Mapping::LoRom, Mapping::HiRom]
            .into_iter()
            .filter_map(|mapping| Self::parse(body, mapping))
            .find(InternalHeader::is_consistent)
    }

    /// Read the header for `mapping`, without validating it
    pub fn parse(body: &[u8], mapping: Mapping) -> Option<Self> {
        let offset = mapping.header_offset();
        let raw = body.get(offset..offset + Self::SIZE)?;

        let title = raw[..Self::TITLE_LEN]
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect::<String>()
            .trim_end()
            .to_string();

        let word = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);

        Some(Self {
            mapping,
            title,
            map_mode: raw[Self::MAP_MODE_OFFSET],
            complement: word(Self::COMPLEMENT_OFFSET),
            checksum: word(Self::CHECKSUM_OFFSET),
        })
    }

    /// Checksum and complement agree
    pub fn is_consistent(&self) -> bool {
        self.checksum ^ self.complement == 0xFFFF
    }

    /// SA-1 cartridges report a `0x23` map mode
    pub fn is_sa1(&self) -> bool {
        self.map_mode == 0x23
    }
}
