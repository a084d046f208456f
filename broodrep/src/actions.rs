//! Decoding the "commands" section into a lazy stream of typed actions
//! (spec component "ActionStream").

use std::borrow::Cow;

/// A gap between consecutive frame headers larger than this many ticks is
/// treated as corruption; the stream truncates gracefully from that point.
const FRAME_GAP_LIMIT: u32 = 10_000;

/// One decoded action from the commands stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub frame: u32,
    pub player: u8,
    pub opcode: u8,
    pub params: OpcodeParams,
}

impl Action {
    /// Lossily interprets a [`OpcodeParams::Chat`] payload as UTF-8 text.
    /// Returns `None` for any other opcode. The source format makes no
    /// claim about chat character encoding, so this is a convenience only.
    pub fn chat_text_lossy(&self) -> Option<Cow<'_, str>> {
        match &self.params {
            OpcodeParams::Chat { text, .. } => Some(String::from_utf8_lossy(text)),
            _ => None,
        }
    }
}

/// Opcode-specific parameters. Unrecognized opcodes decode as `Unknown`
/// rather than failing the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcodeParams {
    Select { unit_ids: Vec<u16> },
    ShiftSelect { unit_ids: Vec<u16> },
    ShiftDeselect { unit_ids: Vec<u16> },
    Build { building_type: u8, x: u16, y: u16, unit_type: u16 },
    Vision([u8; 2]),
    Ally([u8; 4]),
    HotKey { kind: u8, slot: u8 },
    Move { x: u16, y: u16, unit: u16, target_unit: u16, modifier: u8 },
    Attack {
        x: u16,
        y: u16,
        unit: u16,
        target_unit: u16,
        attack_type: u8,
        modifier: u8,
    },
    Cancel,
    CancelHatch,
    Stop(u8),
    ReturnCargo(u8),
    Train { unit_type: u16 },
    CancelTrain([u8; 2]),
    Cloak(Vec<u8>),
    Decloak(Vec<u8>),
    Hatch { unit_type: u16 },
    Unsiege(u8),
    Siege(u8),
    BuildInterceptor,
    UnloadAll(u8),
    Unload([u8; 2]),
    MergeArchon,
    HoldPosition(u8),
    Burrow(u8),
    Unburrow(u8),
    CancelNuke,
    Lift([u8; 4]),
    Research { tech_id: u8 },
    CancelResearch,
    Upgrade { upgrade_id: u8 },
    Morph { unit_type: u16 },
    Stim,
    LeaveGame { how: u8 },
    MergeDarkArchon,
    Chat { sender_slot: u8, text: Vec<u8> },
    Unknown(Vec<u8>),
}

/// Lazy, single-pass, restartable-only-by-reconstruction iterator over a
/// decompressed commands section.
pub struct ActionStream<'a> {
    data: &'a [u8],
    pos: usize,
    block_end: usize,
    current_frame: u32,
    prev_frame: Option<u32>,
    truncated: bool,
}

impl<'a> ActionStream<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ActionStream {
            data,
            pos: 0,
            block_end: 0,
            current_frame: 0,
            prev_frame: None,
            truncated: false,
        }
    }

    /// Whether the stream stopped early due to a frame-gap or a truncated
    /// block, rather than running out of well-formed input.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.pos + n > self.block_end {
            self.truncated = true;
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn take_u8(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    fn take_u16(&mut self) -> Option<u16> {
        self.take(2).map(|s| u16::from_le_bytes([s[0], s[1]]))
    }

    fn take_array2(&mut self) -> Option<[u8; 2]> {
        self.take(2).map(|s| [s[0], s[1]])
    }

    fn take_array4(&mut self) -> Option<[u8; 4]> {
        self.take(4).map(|s| [s[0], s[1], s[2], s[3]])
    }

    fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..self.block_end];
        self.pos = self.block_end;
        slice
    }

    fn take_select_ids(&mut self) -> Option<Vec<u16>> {
        let count = self.take_u8()? as usize;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.take_u16()?);
        }
        Some(ids)
    }

    fn parse_params(&mut self, opcode: u8) -> Option<OpcodeParams> {
        Some(match opcode {
            0x09 => OpcodeParams::Select { unit_ids: self.take_select_ids()? },
            0x0A => OpcodeParams::ShiftSelect { unit_ids: self.take_select_ids()? },
            0x0B => OpcodeParams::ShiftDeselect { unit_ids: self.take_select_ids()? },
            0x0C => {
                let building_type = self.take_u8()?;
                let x = self.take_u16()?;
                let y = self.take_u16()?;
                let unit_type = self.take_u16()?;
                OpcodeParams::Build { building_type, x, y, unit_type }
            }
            0x0D => OpcodeParams::Vision(self.take_array2()?),
            0x0E => OpcodeParams::Ally(self.take_array4()?),
            0x13 => {
                let kind = self.take_u8()?;
                let slot = self.take_u8()?;
                OpcodeParams::HotKey { kind, slot }
            }
            0x14 => {
                let x = self.take_u16()?;
                let y = self.take_u16()?;
                let unit = self.take_u16()?;
                let target_unit = self.take_u16()?;
                let modifier = self.take_u8()?;
                OpcodeParams::Move { x, y, unit, target_unit, modifier }
            }
            0x15 => {
                let x = self.take_u16()?;
                let y = self.take_u16()?;
                let unit = self.take_u16()?;
                let target_unit = self.take_u16()?;
                let attack_type = self.take_u8()?;
                let modifier = self.take_u8()?;
                OpcodeParams::Attack { x, y, unit, target_unit, attack_type, modifier }
            }
            0x18 => OpcodeParams::Cancel,
            0x19 => OpcodeParams::CancelHatch,
            0x1A => OpcodeParams::Stop(self.take_u8()?),
            0x1E => OpcodeParams::ReturnCargo(self.take_u8()?),
            0x1F => OpcodeParams::Train { unit_type: self.take_u16()? },
            0x20 => OpcodeParams::CancelTrain(self.take_array2()?),
            0x21 => OpcodeParams::Cloak(self.take_rest().to_vec()),
            0x22 => OpcodeParams::Decloak(self.take_rest().to_vec()),
            0x23 => OpcodeParams::Hatch { unit_type: self.take_u16()? },
            0x25 => OpcodeParams::Unsiege(self.take_u8()?),
            0x26 => OpcodeParams::Siege(self.take_u8()?),
            0x27 => OpcodeParams::BuildInterceptor,
            0x28 => OpcodeParams::UnloadAll(self.take_u8()?),
            0x29 => OpcodeParams::Unload(self.take_array2()?),
            0x2A => OpcodeParams::MergeArchon,
            0x2B => OpcodeParams::HoldPosition(self.take_u8()?),
            0x2C => OpcodeParams::Burrow(self.take_u8()?),
            0x2D => OpcodeParams::Unburrow(self.take_u8()?),
            0x2E => OpcodeParams::CancelNuke,
            0x2F => OpcodeParams::Lift(self.take_array4()?),
            0x30 => OpcodeParams::Research { tech_id: self.take_u8()? },
            0x31 => OpcodeParams::CancelResearch,
            0x32 => OpcodeParams::Upgrade { upgrade_id: self.take_u8()? },
            0x35 => OpcodeParams::Morph { unit_type: self.take_u16()? },
            0x36 => OpcodeParams::Stim,
            0x57 => OpcodeParams::LeaveGame { how: self.take_u8()? },
            0x5A => OpcodeParams::MergeDarkArchon,
            0x5C => {
                let sender_slot = self.take_u8()?;
                let rest = self.take_rest();
                let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                OpcodeParams::Chat { sender_slot, text: rest[..end].to_vec() }
            }
            _ => OpcodeParams::Unknown(self.take_rest().to_vec()),
        })
    }
}

impl<'a> Iterator for ActionStream<'a> {
    type Item = Action;

    fn next(&mut self) -> Option<Action> {
        loop {
            if self.truncated {
                return None;
            }
            if self.pos >= self.block_end {
                // Need a new frame_block header: frame:u32, block_len:u8.
                if self.pos + 5 > self.data.len() {
                    return None;
                }
                let frame = u32::from_le_bytes([
                    self.data[self.pos],
                    self.data[self.pos + 1],
                    self.data[self.pos + 2],
                    self.data[self.pos + 3],
                ]);
                let block_len = self.data[self.pos + 4] as usize;

                if let Some(prev) = self.prev_frame {
                    // Matches the source's `uint32_t` subtraction: a backward
                    // jump underflows to a huge value and is treated as a gap
                    // too large to trust, keeping emitted frames monotonic.
                    if frame.wrapping_sub(prev) > FRAME_GAP_LIMIT {
                        self.truncated = true;
                        return None;
                    }
                }

                let header_end = self.pos + 5;
                let block_end = header_end + block_len;
                if block_end > self.data.len() {
                    self.truncated = true;
                    return None;
                }

                self.prev_frame = Some(frame);
                self.current_frame = frame;
                self.pos = header_end;
                self.block_end = block_end;
                continue;
            }

            if self.pos + 2 > self.block_end {
                self.truncated = true;
                return None;
            }
            let player = self.data[self.pos];
            let opcode = self.data[self.pos + 1];
            self.pos += 2;

            return match self.parse_params(opcode) {
                Some(params) => Some(Action {
                    frame: self.current_frame,
                    player,
                    opcode,
                    params,
                }),
                None => None,
            };
        }
    }
}
