//! Engine stand-in that runs without an emulator core.
//!
//! It validates the ROM, keeps deterministic frame and input counters and
//! renders a small PPM image, which is enough to operate the whole service
//! end to end.

use std::{fs, io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Engine, EngineError, EngineFactory, Frame};
use crate::state::game::Action;

const SCREEN_WIDTH: usize = 160;
const SCREEN_HEIGHT: usize = 144;
const PPM_CONTENT_TYPE: &str = "image/x-portable-pixmap";
/// Cartridge title bytes in a Game Boy header.
const TITLE_RANGE: std::ops::Range<usize> = 0x134..0x144;

/// Factory producing [`HeadlessEngine`] instances.
#[derive(Debug, Clone, Default)]
pub struct HeadlessEngineFactory;

impl EngineFactory for HeadlessEngineFactory {
    fn construct(&self, rom_path: &Path) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(HeadlessEngine::open(rom_path)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HeadlessState {
    rom_checksum: u32,
    frame: u64,
    presses: Vec<u64>,
    held: Option<(Action, u32)>,
}

/// Deterministic engine used when no emulator core is linked in.
#[derive(Debug)]
pub struct HeadlessEngine {
    title: String,
    state: HeadlessState,
}

impl HeadlessEngine {
    /// Read and validate the ROM at `path`.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let rom = fs::read(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                EngineError::RomNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                EngineError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        if rom.is_empty() {
            return Err(EngineError::InvalidRom {
                path: path.to_path_buf(),
                reason: "file is empty".into(),
            });
        }

        let title = cartridge_title(&rom).unwrap_or_else(|| fallback_title(path));
        debug!(title = %title, size = rom.len(), "headless engine opened ROM");

        Ok(Self {
            title,
            state: HeadlessState {
                rom_checksum: checksum(&rom),
                frame: 0,
                presses: vec![0; Action::COUNT],
                held: None,
            },
        })
    }

    /// Title read from the cartridge header, or the file stem.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of frames emulated so far.
    pub fn frame_count(&self) -> u64 {
        self.state.frame
    }

    /// Number of times `action` was pressed.
    pub fn presses(&self, action: Action) -> u64 {
        self.state
            .presses
            .get(action.index())
            .copied()
            .unwrap_or_default()
    }

    fn render(&self) -> Vec<u8> {
        let header = format!("P6\n{SCREEN_WIDTH} {SCREEN_HEIGHT}\n255\n");
        let mut bytes = Vec::with_capacity(header.len() + SCREEN_WIDTH * SCREEN_HEIGHT * 3);
        bytes.extend_from_slice(header.as_bytes());

        let shade = (self.state.frame / 60 % 64) as u8;
        let held_band = self
            .state
            .held
            .map(|(action, _)| action.index() * SCREEN_HEIGHT / Action::COUNT);
        let band_height = SCREEN_HEIGHT / Action::COUNT;

        for y in 0..SCREEN_HEIGHT {
            let highlighted = held_band.is_some_and(|top| y >= top && y < top + band_height);
            for x in 0..SCREEN_WIDTH {
                let base = shade.wrapping_add((x / 8) as u8);
                if highlighted {
                    bytes.extend_from_slice(&[0xe0, 0xf8, 0xd0]);
                } else {
                    bytes.extend_from_slice(&[0x08 + base, 0x18 + base, 0x20 + base]);
                }
            }
        }
        bytes
    }
}

impl Engine for HeadlessEngine {
    fn apply_action(&mut self, action: Action, hold_ticks: u32) -> Result<(), EngineError> {
        if let Some(slot) = self.state.presses.get_mut(action.index()) {
            *slot += 1;
        }
        self.state.held = Some((action, hold_ticks));
        Ok(())
    }

    fn advance(&mut self, frames: u32, _render: bool) -> Result<(), EngineError> {
        self.state.frame = self
            .state
            .frame
            .checked_add(u64::from(frames))
            .ok_or_else(|| EngineError::Fault("frame counter overflow".into()))?;
        self.state.held = match self.state.held {
            Some((action, remaining)) if remaining > frames => Some((action, remaining - frames)),
            _ => None,
        };
        Ok(())
    }

    fn current_frame(&self) -> Result<Frame, EngineError> {
        Ok(Frame {
            content_type: PPM_CONTENT_TYPE,
            bytes: self.render(),
        })
    }

    fn save_state(&mut self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(&self.state).map_err(|err| EngineError::State(err.to_string()))
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), EngineError> {
        let restored: HeadlessState =
            serde_json::from_slice(state).map_err(|err| EngineError::State(err.to_string()))?;
        if restored.rom_checksum != self.state.rom_checksum {
            return Err(EngineError::State(
                "saved state belongs to a different ROM".into(),
            ));
        }
        if restored.presses.len() != Action::COUNT {
            return Err(EngineError::State("saved press counters are malformed".into()));
        }
        self.state = restored;
        Ok(())
    }
}

fn checksum(rom: &[u8]) -> u32 {
    rom.iter()
        .fold(0u32, |acc, &byte| acc.rotate_left(5) ^ u32::from(byte))
}

fn cartridge_title(rom: &[u8]) -> Option<String> {
    let raw = rom.get(TITLE_RANGE)?;
    let title: String = raw
        .iter()
        .take_while(|&&byte| byte != 0)
        .filter(|byte| byte.is_ascii_graphic() || **byte == b' ')
        .map(|&byte| byte as char)
        .collect();
    let title = title.trim().to_owned();
    (!title.is_empty()).then_some(title)
}

fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_rom(name: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crowdplay-headless-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_rom_is_reported() {
        let err = HeadlessEngine::open(Path::new("/definitely/not/here.gb")).unwrap_err();
        assert!(matches!(err, EngineError::RomNotFound { .. }));
    }

    #[test]
    fn empty_rom_is_rejected() {
        let path = write_rom("empty.gb", &[]);
        let err = HeadlessEngine::open(&path).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRom { .. }));
    }

    #[test]
    fn reads_title_from_cartridge_header() {
        let mut rom = vec![0u8; 0x150];
        rom[0x134..0x13b].copy_from_slice(b"POKEMON");
        let path = write_rom("red.gb", &rom);
        let engine = HeadlessEngine::open(&path).unwrap();
        assert_eq!(engine.title(), "POKEMON");
    }

    #[test]
    fn falls_back_to_file_stem() {
        let path = write_rom("tetris.gb", b"tiny");
        let engine = HeadlessEngine::open(&path).unwrap();
        assert_eq!(engine.title(), "tetris");
    }

    #[test]
    fn state_round_trips_and_rejects_foreign_saves() {
        let path = write_rom("a.gb", b"first rom");
        let mut engine = HeadlessEngine::open(&path).unwrap();
        engine.apply_action(Action::Start, 2).unwrap();
        engine.advance(60, true).unwrap();
        let saved = engine.save_state().unwrap();

        let mut fresh = HeadlessEngine::open(&path).unwrap();
        fresh.load_state(&saved).unwrap();
        assert_eq!(fresh.frame_count(), 60);
        assert_eq!(fresh.presses(Action::Start), 1);

        let other = write_rom("b.gb", b"second rom");
        let mut foreign = HeadlessEngine::open(&other).unwrap();
        assert!(foreign.load_state(&saved).is_err());
        assert!(foreign.load_state(b"not json").is_err());
        assert_eq!(foreign.frame_count(), 0);
    }

    #[test]
    fn renders_a_full_ppm_frame() {
        let path = write_rom("c.gb", b"rom");
        let engine = HeadlessEngine::open(&path).unwrap();
        let frame = engine.current_frame().unwrap();
        let header = b"P6\n160 144\n255\n";
        assert!(frame.bytes.starts_with(header));
        assert_eq!(frame.bytes.len(), header.len() + 160 * 144 * 3);
        assert_eq!(frame.content_type, PPM_CONTENT_TYPE);
    }
}
