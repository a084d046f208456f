//! The 633-byte fixed-layout replay header (section 1 of a replay file).

use std::fmt;

use byteorder::{LittleEndian as LE, ReadBytesExt as _};

use crate::BroodrepError;

/// Exact decompressed size of the header section, in bytes.
pub const HEADER_SIZE: usize = 633;

const PLAYER_SLOT_COUNT: usize = 12;
const PLAYER_SLOT_SIZE: usize = 36;

/// Which engine build produced the replay.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Engine {
    Vanilla,
    Expansion,
    Unknown(u8),
}

impl From<u8> for Engine {
    fn from(value: u8) -> Self {
        match value {
            0 => Engine::Vanilla,
            1 => Engine::Expansion,
            other => Engine::Unknown(other),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Vanilla => write!(f, "StarCraft"),
            Engine::Expansion => write!(f, "Brood War"),
            Engine::Unknown(v) => write!(f, "Unknown engine ({v:#x})"),
        }
    }
}

/// A slot's player kind, independent of whether the slot is actually occupied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlayerType {
    None,
    Computer,
    Human,
    Unknown(u8),
}

impl From<u8> for PlayerType {
    fn from(value: u8) -> Self {
        match value {
            0 => PlayerType::None,
            1 => PlayerType::Computer,
            2 => PlayerType::Human,
            other => PlayerType::Unknown(other),
        }
    }
}

impl fmt::Display for PlayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerType::None => write!(f, "None"),
            PlayerType::Computer => write!(f, "Computer"),
            PlayerType::Human => write!(f, "Human"),
            PlayerType::Unknown(v) => write!(f, "Unknown ({v:#x})"),
        }
    }
}

/// A slot's race. `Other` is used by observer slots in practice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Race {
    Zerg,
    Terran,
    Protoss,
    Other,
    Unknown(u8),
}

impl From<u8> for Race {
    fn from(value: u8) -> Self {
        match value {
            0 => Race::Zerg,
            1 => Race::Terran,
            2 => Race::Protoss,
            6 => Race::Other,
            other => Race::Unknown(other),
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Race::Zerg => write!(f, "Zerg"),
            Race::Terran => write!(f, "Terran"),
            Race::Protoss => write!(f, "Protoss"),
            Race::Other => write!(f, "Other"),
            Race::Unknown(v) => write!(f, "Unknown ({v:#x})"),
        }
    }
}

/// The simulation speed the game was played at. The exact tick durations are
/// advisory/display data only; they are never used to drive decoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GameSpeed {
    Slowest,
    Slower,
    Slow,
    Normal,
    Fast,
    Faster,
    Fastest,
    Unknown(u8),
}

impl From<u8> for GameSpeed {
    fn from(value: u8) -> Self {
        match value {
            0 => GameSpeed::Slowest,
            1 => GameSpeed::Slower,
            2 => GameSpeed::Slow,
            3 => GameSpeed::Normal,
            4 => GameSpeed::Fast,
            5 => GameSpeed::Faster,
            6 => GameSpeed::Fastest,
            other => GameSpeed::Unknown(other),
        }
    }
}

impl GameSpeed {
    /// Approximate wall-clock duration of a single game tick at this speed.
    /// Not derived from any decoding input; purely advisory.
    pub fn time_per_step(&self) -> std::time::Duration {
        use std::time::Duration;
        let millis = match self {
            GameSpeed::Slowest => 167,
            GameSpeed::Slower => 111,
            GameSpeed::Slow => 83,
            GameSpeed::Normal => 67,
            GameSpeed::Fast => 56,
            GameSpeed::Faster => 45,
            GameSpeed::Fastest => 42,
            GameSpeed::Unknown(_) => 42,
        };
        Duration::from_millis(millis)
    }
}

impl fmt::Display for GameSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameSpeed::Slowest => write!(f, "Slowest"),
            GameSpeed::Slower => write!(f, "Slower"),
            GameSpeed::Slow => write!(f, "Slow"),
            GameSpeed::Normal => write!(f, "Normal"),
            GameSpeed::Fast => write!(f, "Fast"),
            GameSpeed::Faster => write!(f, "Faster"),
            GameSpeed::Fastest => write!(f, "Fastest"),
            GameSpeed::Unknown(v) => write!(f, "Unknown ({v:#x})"),
        }
    }
}

/// The lobby's game mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GameType {
    Melee,
    FreeForAll,
    OneOnOne,
    CaptureTheFlag,
    Greed,
    Slaughter,
    SuddenDeath,
    Ladder,
    UseMapSettings,
    TeamMelee,
    TeamFreeForAll,
    TeamCaptureTheFlag,
    TopVsBottom,
    Unknown(u8),
}

impl From<u8> for GameType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => GameType::Melee,
            0x01 => GameType::FreeForAll,
            0x02 => GameType::OneOnOne,
            0x03 => GameType::CaptureTheFlag,
            0x04 => GameType::Greed,
            0x05 => GameType::Slaughter,
            0x06 => GameType::SuddenDeath,
            0x07 => GameType::Ladder,
            0x08 => GameType::UseMapSettings,
            0x09 => GameType::TeamMelee,
            0x0A => GameType::TeamFreeForAll,
            0x0B => GameType::TeamCaptureTheFlag,
            0x0F => GameType::TopVsBottom,
            other => GameType::Unknown(other),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameType::Melee => "Melee",
            GameType::FreeForAll => "Free For All",
            GameType::OneOnOne => "One on One",
            GameType::CaptureTheFlag => "Capture the Flag",
            GameType::Greed => "Greed",
            GameType::Slaughter => "Slaughter",
            GameType::SuddenDeath => "Sudden Death",
            GameType::Ladder => "Ladder",
            GameType::UseMapSettings => "Use Map Settings",
            GameType::TeamMelee => "Team Melee",
            GameType::TeamFreeForAll => "Team Free For All",
            GameType::TeamCaptureTheFlag => "Team Capture the Flag",
            GameType::TopVsBottom => "Top vs Bottom",
            GameType::Unknown(v) => return write!(f, "Unknown ({v:#x})"),
        };
        write!(f, "{name}")
    }
}

/// One of the header's 12 fixed player slots, in header order. A "logical
/// player" is a slot whose `player_type` is not [`PlayerType::None`].
#[derive(Debug, Clone)]
pub struct Player {
    pub slot_id: u16,
    pub network_id: u8,
    pub team_slot: i32,
    pub player_type: PlayerType,
    pub race: Race,
    pub team: u8,
    pub name: String,
}

impl Player {
    pub fn is_empty(&self) -> bool {
        self.player_type == PlayerType::None
    }

    /// Observer slots are logical players that never pick a real race.
    pub fn is_observer(&self) -> bool {
        !self.is_empty() && self.race == Race::Other
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HeaderRaw {
    pub engine: Engine,
    pub frames: u32,
    pub creation_time_unix: u32,
    pub game_name: String,
    pub map_width: u16,
    pub map_height: u16,
    pub creator_name: String,
    pub map_type: u8,
    pub map_name: String,
    pub speed_tag: u8,
    pub type_tag: u8,
    pub game_sub_type: u16,
    pub slots: Vec<Player>,
    #[allow(dead_code)]
    pub spot_order: [u32; 8],
    #[allow(dead_code)]
    pub spot_used: [u8; 8],
}

fn read_cstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

pub(crate) fn parse_header(bytes: &[u8]) -> Result<HeaderRaw, BroodrepError> {
    if bytes.len() != HEADER_SIZE {
        return Err(BroodrepError::HeaderSizeMismatch {
            got: bytes.len(),
            want: HEADER_SIZE,
        });
    }

    let engine = Engine::from(bytes[0]);
    let frames = (&bytes[1..5]).read_u32::<LE>()?;
    // +5 u8[3] reserved
    let creation_time_unix = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    // +12 u8[8] reserved
    let speed_tag = bytes[20];
    let type_tag = bytes[21];
    let game_sub_type = u16::from_le_bytes(bytes[22..24].try_into().unwrap());
    let game_name = read_cstring(&bytes[24..52]);
    let map_width = u16::from_le_bytes(bytes[52..54].try_into().unwrap());
    let map_height = u16::from_le_bytes(bytes[54..56].try_into().unwrap());
    // +56 u8[16] reserved
    let creator_name = read_cstring(&bytes[72..96]);
    let map_type = bytes[96];
    let map_name = read_cstring(&bytes[97..120]);
    // +120 u8[41] reserved

    let mut slots = Vec::with_capacity(PLAYER_SLOT_COUNT);
    for i in 0..PLAYER_SLOT_COUNT {
        let off = 161 + i * PLAYER_SLOT_SIZE;
        let slot = &bytes[off..off + PLAYER_SLOT_SIZE];
        let slot_number = u32::from_le_bytes(slot[0..4].try_into().unwrap());
        let team_slot = i32::from_le_bytes(slot[4..8].try_into().unwrap());
        let player_type = PlayerType::from(slot[8]);
        let race = Race::from(slot[9]);
        let marker = slot[10];
        let name = read_cstring(&slot[11..36]);
        slots.push(Player {
            slot_id: slot_number as u16,
            network_id: marker,
            team_slot,
            player_type,
            race,
            team: team_slot.max(0) as u8,
            name,
        });
    }

    let spot_order_off = 161 + PLAYER_SLOT_COUNT * PLAYER_SLOT_SIZE;
    let mut spot_order = [0u32; 8];
    for (i, chunk) in bytes[spot_order_off..spot_order_off + 32]
        .chunks_exact(4)
        .enumerate()
    {
        spot_order[i] = u32::from_le_bytes(chunk.try_into().unwrap());
    }
    let spot_used_off = spot_order_off + 32;
    let mut spot_used = [0u8; 8];
    spot_used.copy_from_slice(&bytes[spot_used_off..spot_used_off + 8]);

    debug_assert_eq!(spot_used_off + 8, HEADER_SIZE);

    Ok(HeaderRaw {
        engine,
        frames,
        creation_time_unix,
        game_name,
        map_width,
        map_height,
        creator_name,
        map_type,
        map_name,
        speed_tag,
        type_tag,
        game_sub_type,
        slots,
        spot_order,
        spot_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_header() -> Vec<u8> {
        vec![0u8; HEADER_SIZE]
    }

    #[test]
    fn rejects_wrong_length() {
        let err = parse_header(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            BroodrepError::HeaderSizeMismatch { got: 10, want: 633 }
        ));
    }

    #[test]
    fn parses_engine_and_dimensions() {
        let mut bytes = blank_header();
        bytes[0] = 1; // Expansion
        bytes[52..54].copy_from_slice(&128u16.to_le_bytes());
        bytes[54..56].copy_from_slice(&128u16.to_le_bytes());
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.engine, Engine::Expansion);
        assert_eq!(header.map_width, 128);
        assert_eq!(header.map_height, 128);
    }

    #[test]
    fn parses_nul_terminated_strings() {
        let mut bytes = blank_header();
        bytes[24..24 + 4].copy_from_slice(b"abc\0");
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.game_name, "abc");
    }

    #[test]
    fn empty_slot_is_not_logical_player() {
        let bytes = blank_header();
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.slots.len(), 12);
        assert!(header.slots[0].is_empty());
    }

    #[test]
    fn observer_detected_via_other_race() {
        let mut bytes = blank_header();
        let off = 161;
        bytes[off + 8] = 2; // Human
        bytes[off + 9] = 6; // Other (observer convention)
        let header = parse_header(&bytes).unwrap();
        assert!(!header.slots[0].is_empty());
        assert!(header.slots[0].is_observer());
    }
}
