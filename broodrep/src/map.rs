//! Walking the decompressed "map" section as a FOURCC block chain
//! (spec component "MapDirectory").

/// Hard limit on the number of sections indexed per replay; inherited from
/// the source format. Replays with more sections are truncated, not
/// rejected.
const MAX_SECTIONS: usize = 36;

const UNIT_RECORD_SIZE: usize = 36;

/// One `(tag, payload)` entry from the map block chain.
#[derive(Debug, Clone, Copy)]
pub struct MapSection<'a> {
    pub tag: [u8; 4],
    pub data: &'a [u8],
}

/// Named index over a decompressed map payload. Lookup is linear; in
/// practice there are at most [`MAX_SECTIONS`] entries.
#[derive(Debug, Clone)]
pub struct MapDirectory<'a> {
    sections: Vec<MapSection<'a>>,
}

impl<'a> MapDirectory<'a> {
    pub(crate) fn new(payload: &'a [u8]) -> Self {
        let mut sections = Vec::new();
        let mut pos = 0usize;
        while sections.len() < MAX_SECTIONS && pos + 8 <= payload.len() {
            let tag = [
                payload[pos],
                payload[pos + 1],
                payload[pos + 2],
                payload[pos + 3],
            ];
            let length = u32::from_le_bytes([
                payload[pos + 4],
                payload[pos + 5],
                payload[pos + 6],
                payload[pos + 7],
            ]) as usize;
            let data_start = pos + 8;
            let Some(data_end) = data_start.checked_add(length) else {
                break;
            };
            if data_end > payload.len() {
                // Truncated final block: stop without error.
                break;
            }
            sections.push(MapSection {
                tag,
                data: &payload[data_start..data_end],
            });
            pos = data_end;
        }
        MapDirectory { sections }
    }

    /// All sections in file order.
    pub fn sections(&self) -> &[MapSection<'a>] {
        &self.sections
    }

    /// Case-insensitive lookup by 4-byte FOURCC tag. `name` shorter than 4
    /// bytes is right-padded with spaces, matching tags like `"ERA "`.
    pub fn section(&self, name: &str) -> Option<&'a [u8]> {
        let mut padded = [b' '; 4];
        for (i, b) in name.as_bytes().iter().take(4).enumerate() {
            padded[i] = *b;
        }
        self.sections
            .iter()
            .find(|s| s.tag.eq_ignore_ascii_case(&padded))
            .map(|s| s.data)
    }

    /// Convenience: prefer `TILE`, fall back to `MTXM`.
    pub fn tile_section(&self) -> Option<&'a [u8]> {
        self.section("TILE").or_else(|| self.section("MTXM"))
    }

    /// Iterates the `UNIT` section as fixed-size 36-byte descriptor records.
    /// Trailing partial bytes (when `length` is not a multiple of 36) are
    /// ignored.
    pub fn units(&self) -> impl Iterator<Item = UnitRecord> + 'a {
        let data = self.section("UNIT").unwrap_or(&[]);
        let count = data.len() / UNIT_RECORD_SIZE;
        (0..count).map(move |i| UnitRecord::parse(&data[i * UNIT_RECORD_SIZE..][..UNIT_RECORD_SIZE]))
    }
}

/// Well-known special values for [`UnitRecord::unit_id`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpecialUnitId {
    MineralTier1,
    MineralTier2,
    MineralTier3,
    Geyser,
    StartLocation,
}

impl SpecialUnitId {
    pub fn from_unit_id(unit_id: u16) -> Option<Self> {
        match unit_id {
            176 => Some(SpecialUnitId::MineralTier1),
            177 => Some(SpecialUnitId::MineralTier2),
            178 => Some(SpecialUnitId::MineralTier3),
            188 => Some(SpecialUnitId::Geyser),
            214 => Some(SpecialUnitId::StartLocation),
            _ => None,
        }
    }
}

/// A single 36-byte unit placement record from the `UNIT` map section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRecord {
    pub d1: u16,
    pub d2: u16,
    pub x: u16,
    pub y: u16,
    pub unit_id: u16,
    pub player_id: u8,
    pub resource_amount: u16,
}

impl UnitRecord {
    fn parse(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), UNIT_RECORD_SIZE);
        let d1 = u16::from_le_bytes([bytes[0], bytes[1]]);
        let d2 = u16::from_le_bytes([bytes[2], bytes[3]]);
        let x = u16::from_le_bytes([bytes[4], bytes[5]]);
        let y = u16::from_le_bytes([bytes[6], bytes[7]]);
        let unit_id = u16::from_le_bytes([bytes[8], bytes[9]]);
        // bytes[10..16] reserved
        let player_id = bytes[16];
        // bytes[17..20] reserved
        let resource_amount = u16::from_le_bytes([bytes[20], bytes[21]]);
        // bytes[22..36] reserved
        UnitRecord {
            d1,
            d2,
            x,
            y,
            unit_id,
            player_id,
            resource_amount,
        }
    }

    pub fn special_kind(&self) -> Option<SpecialUnitId> {
        SpecialUnitId::from_unit_id(self.unit_id)
    }
}
