use std::io::{Read, Seek, SeekFrom};
use std::marker::PhantomData;

use thiserror::Error;

mod actions;
mod compression;
mod header;
mod map;
mod section;
mod shieldbattery;

pub use actions::{Action, ActionStream, OpcodeParams};
pub use compression::{DecompressionConfig, DecompressionError};
pub use header::{Engine, GameSpeed, GameType, Player, PlayerType, Race};
pub use map::{MapDirectory, MapSection, SpecialUnitId, UnitRecord};
pub use shieldbattery::{ShieldBatteryData, ShieldBatteryDataError, ShieldBatteryDataV0, ShieldBatteryDataV1};

use header::{parse_header, HeaderRaw};

#[derive(Error, Debug)]
pub enum BroodrepError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),
    #[error("bad magic bytes")]
    BadMagic,
    #[error("truncated input while reading {at}")]
    TruncatedInput { at: &'static str },
    #[error("corrupt section during {stage}: {detail}")]
    CorruptSection { stage: &'static str, detail: String },
    #[error("header decompressed to {got} bytes, expected {want}")]
    HeaderSizeMismatch { got: usize, want: usize },
}

/// A fully-decoded replay: header fields, the commands section, and the map
/// section, each decompressed exactly once at construction time (spec
/// component boundary: this is the owner of the three decompressed buffers;
/// [`ActionStream`] and [`MapDirectory`] are non-owning views bound to this
/// value's lifetime).
#[derive(Debug)]
pub struct Replay<R> {
    format: ReplayFormat,
    header: HeaderRaw,
    commands: Vec<u8>,
    map_payload: Vec<u8>,
    shieldbattery: Option<ShieldBatteryData>,
    _marker: PhantomData<R>,
}

impl<R: Read + Seek> Replay<R> {
    /// Decodes a replay using the default [`DecompressionConfig`].
    pub fn new(reader: R) -> Result<Self, BroodrepError> {
        Self::new_with_decompression_config(reader, DecompressionConfig::default())
    }

    /// Decodes a replay, bounding section decompression with `config` (size,
    /// ratio, and wall-clock limits against zip-bomb-style inputs).
    pub fn new_with_decompression_config(
        mut reader: R,
        config: DecompressionConfig,
    ) -> Result<Self, BroodrepError> {
        let format = Self::detect_format(&mut reader)?;

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let mut rest: &[u8] = &raw;

        let (header_bytes, next) = section::read_section(rest, format, config)?;
        rest = next;
        let header = parse_header(&header_bytes)?;

        let (commands, next) = section::read_section(rest, format, config)?;
        rest = next;

        let (map_payload, next) = section::read_section(rest, format, config)?;
        rest = next;

        // An optional trailing extension block some clients (ShieldBattery)
        // append after the map section. Absence or malformed content is not
        // a decode error; the replay is still valid without it.
        let shieldbattery = shieldbattery::parse_shieldbattery_section(rest).ok();

        Ok(Replay {
            format,
            header,
            commands,
            map_payload,
            shieldbattery,
            _marker: PhantomData,
        })
    }

    fn detect_format(reader: &mut R) -> Result<ReplayFormat, BroodrepError> {
        // Magic sits at the very start of the file (spec Section 6.1): 1.21+
        // replays carry `seRS`, earlier ones carry `reRS` (the little-endian
        // bytes of the spec's `0x53526572` constant). The framed header
        // section begins immediately after these 4 bytes — no intervening
        // reserved bytes or tag byte.
        reader.seek(SeekFrom::Start(0))?;
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if magic == *b"seRS" {
            return Ok(ReplayFormat::Modern121);
        }
        if magic != *b"reRS" {
            return Err(BroodrepError::BadMagic);
        }
        Ok(ReplayFormat::Legacy)
    }
}

impl<R> Replay<R> {
    pub fn format(&self) -> ReplayFormat {
        self.format
    }

    pub fn engine(&self) -> Engine {
        self.header.engine
    }

    /// Game length, in logic ticks (see [`GameSpeed::time_per_step`] for the
    /// advisory tick duration).
    pub fn frames(&self) -> u32 {
        self.header.frames
    }

    /// When the replay was recorded, if the header carries a non-zero
    /// timestamp.
    pub fn start_time(&self) -> Option<chrono::NaiveDateTime> {
        if self.header.creation_time_unix == 0 {
            return None;
        }
        chrono::DateTime::from_timestamp(self.header.creation_time_unix as i64, 0)
            .map(|dt| dt.naive_utc())
    }

    pub fn game_title(&self) -> &str {
        &self.header.game_name
    }

    pub fn map_name(&self) -> &str {
        &self.header.map_name
    }

    pub fn creator_name(&self) -> &str {
        &self.header.creator_name
    }

    /// `(width, height)` in 8-pixel walk-tiles.
    pub fn map_dimensions(&self) -> (u16, u16) {
        (self.header.map_width, self.header.map_height)
    }

    pub fn game_speed(&self) -> GameSpeed {
        GameSpeed::from(self.header.speed_tag)
    }

    pub fn game_type(&self) -> GameType {
        GameType::from(self.header.type_tag)
    }

    pub fn game_sub_type(&self) -> u16 {
        self.header.game_sub_type
    }

    /// All 12 header slots, including empty ones, in header order.
    pub fn slots(&self) -> &[Player] {
        &self.header.slots
    }

    /// Logical players that are neither empty slots nor observers.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.slots().iter().filter(|p| !p.is_empty() && !p.is_observer())
    }

    /// Logical players that joined as observers.
    pub fn observers(&self) -> impl Iterator<Item = &Player> {
        self.slots().iter().filter(|p| p.is_observer())
    }

    /// The first occupied slot's name, matching common replay-tooling
    /// convention for "who hosted this game".
    pub fn host_name(&self) -> &str {
        self.slots()
            .iter()
            .find(|p| !p.is_empty())
            .map(|p| p.name.as_str())
            .unwrap_or("")
    }

    /// A lazy, single-pass iterator over the decoded commands section.
    pub fn actions(&self) -> ActionStream<'_> {
        ActionStream::new(&self.commands)
    }

    /// A view over the decoded map section's FOURCC block chain.
    pub fn map(&self) -> MapDirectory<'_> {
        MapDirectory::new(&self.map_payload)
    }

    /// ShieldBattery's optional trailing replay-extension block, when present.
    pub fn shieldbattery_data(&self) -> Option<&ShieldBatteryData> {
        self.shieldbattery.as_ref()
    }
}

/// The format version of a replay, identified by its magic bytes (spec
/// Section 6.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReplayFormat {
    /// `reRS` magic: PKWare DCL-implode-compressed sections.
    Legacy,
    /// `seRS` magic (1.21+): zlib-compressed sections.
    Modern121,
}

impl std::fmt::Display for ReplayFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReplayFormat::Legacy => "Legacy",
            ReplayFormat::Modern121 => "Modern (1.21+)",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const CHUNK_MAX: usize = 8192;

    /// Frames one section's compressed-but-actually-raw-passthrough payload:
    /// a single chunk whose declared length equals the whole buffer, so
    /// `SectionCodec` copies it verbatim without touching a codec. This lets
    /// tests build arbitrary section content without real PKWare/zlib data.
    fn raw_section(data: &[u8]) -> Vec<u8> {
        assert!(data.len() <= CHUNK_MAX, "test helper only supports one raw chunk");
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // chunk_count
        out.extend_from_slice(&(data.len() as u32).to_le_bytes()); // chunk_compressed_length
        out.extend_from_slice(data);
        out
    }

    fn empty_section() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u32.to_le_bytes()); // expected_size
        out.extend_from_slice(&0u32.to_le_bytes()); // chunk_count
        out
    }

    fn blank_header() -> Vec<u8> {
        vec![0u8; header::HEADER_SIZE]
    }

    /// Assembles a full on-disk replay buffer per spec Section 6.1: the
    /// 4-byte magic at offset 0, immediately followed by the header's own
    /// section framing, then the commands and map sections.
    fn build_replay(modern121: bool, header_bytes: Vec<u8>, commands: Vec<u8>, map: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        if modern121 {
            out.extend_from_slice(b"seRS");
        } else {
            out.extend_from_slice(b"reRS");
        }
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&commands);
        out.extend_from_slice(&map);
        out
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = vec![0u8; 4]; // first 4 bytes are 0x00000000
        let err = Replay::new(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, BroodrepError::BadMagic));
    }

    #[test]
    fn minimal_well_formed_replay_decodes() {
        let mut header_bytes = blank_header();
        header_bytes[0] = 1; // Expansion
        header_bytes[52..54].copy_from_slice(&128u16.to_le_bytes());
        header_bytes[54..56].copy_from_slice(&128u16.to_le_bytes());

        let bytes = build_replay(
            false,
            raw_section(&header_bytes),
            empty_section(),
            empty_section(),
        );

        let replay = Replay::new(Cursor::new(bytes)).unwrap();
        assert_eq!(replay.engine(), Engine::Expansion);
        assert_eq!(replay.map_dimensions(), (128, 128));
        assert_eq!(replay.actions().count(), 0);
        assert_eq!(replay.map().section("TILE"), None);
    }

    #[test]
    fn modern121_container_decodes_too() {
        let header_bytes = blank_header();
        let bytes = build_replay(true, raw_section(&header_bytes), empty_section(), empty_section());
        let replay = Replay::new(Cursor::new(bytes)).unwrap();
        assert_eq!(replay.format(), ReplayFormat::Modern121);
    }

    #[test]
    fn decodes_actions_and_map_sections() {
        let header_bytes = blank_header();

        let mut commands = Vec::new();
        commands.extend_from_slice(&100u32.to_le_bytes()); // frame
        commands.push(3); // block_len
        commands.extend_from_slice(&[0x00, 0x1A, 0xAA]); // player=0, Stop, u8=0xAA

        let mut unit = vec![0u8; 36];
        unit[8..10].copy_from_slice(&214u16.to_le_bytes());
        unit[16] = 3;
        let mut map = Vec::new();
        map.extend_from_slice(b"UNIT");
        map.extend_from_slice(&36u32.to_le_bytes());
        map.extend_from_slice(&unit);

        let bytes = build_replay(
            false,
            raw_section(&header_bytes),
            raw_section(&commands),
            raw_section(&map),
        );

        let replay = Replay::new(Cursor::new(bytes)).unwrap();
        let actions: Vec<_> = replay.actions().collect();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].frame, 100);
        assert_eq!(actions[0].params, OpcodeParams::Stop(0xAA));

        let units: Vec<_> = replay.map().units().collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_id, 214);
        assert_eq!(units[0].player_id, 3);
    }

    #[test]
    fn players_and_observers_split_slots() {
        let mut header_bytes = blank_header();
        let slot0 = 161;
        header_bytes[slot0 + 8] = 2; // Human
        header_bytes[slot0 + 9] = 1; // Terran
        header_bytes[slot0 + 11..slot0 + 14].copy_from_slice(b"foo");

        let slot1 = 161 + 36;
        header_bytes[slot1 + 8] = 2; // Human
        header_bytes[slot1 + 9] = 6; // Other => observer
        header_bytes[slot1 + 11..slot1 + 14].copy_from_slice(b"obs");

        let bytes = build_replay(
            false,
            raw_section(&header_bytes),
            empty_section(),
            empty_section(),
        );
        let replay = Replay::new(Cursor::new(bytes)).unwrap();

        let players: Vec<_> = replay.players().collect();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "foo");

        let observers: Vec<_> = replay.observers().collect();
        assert_eq!(observers.len(), 1);
        assert_eq!(observers[0].name, "obs");

        assert_eq!(replay.host_name(), "foo");
    }
}
