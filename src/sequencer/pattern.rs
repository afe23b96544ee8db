// Pattern grid - fixed 16 step x 8 slot chord pattern
// Cells are stored as atomics: the control thread writes, the audio thread reads

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of steps in a chord pattern
pub const PATTERN_STEPS: usize = 16;

/// Number of note slots per step
pub const PATTERN_SLOTS: usize = 8;

/// Raw step type value meaning "no note"
pub const EMPTY_STEP_TYPE: i32 = 127;

/// What a pattern cell does when its step is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    /// Start the slot's note (retriggering it if already sounding)
    NoteOn,
    /// Keep the slot's note sounding
    Hold,
    /// Release the slot's note
    Off,
    /// No note
    Empty,
}

impl StepType {
    pub fn as_raw(self) -> i32 {
        match self {
            StepType::NoteOn => 0,
            StepType::Hold => 1,
            StepType::Off => 2,
            StepType::Empty => EMPTY_STEP_TYPE,
        }
    }
}

impl From<i32> for StepType {
    /// Unknown raw values behave as empty cells
    fn from(value: i32) -> Self {
        match value {
            0 => StepType::NoteOn,
            1 => StepType::Hold,
            2 => StepType::Off,
            _ => StepType::Empty,
        }
    }
}

/// One cell of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCell {
    /// Semitone offset from the pattern root
    pub note: i32,
    /// Raw step type (see `StepType`)
    #[serde(rename = "type")]
    pub step_type: i32,
}

impl PatternCell {
    /// The sentinel cell `(0, 127)`
    pub const EMPTY: PatternCell = PatternCell {
        note: 0,
        step_type: EMPTY_STEP_TYPE,
    };

    pub fn new(note: i32, step_type: StepType) -> Self {
        Self {
            note,
            step_type: step_type.as_raw(),
        }
    }

    pub fn kind(&self) -> StepType {
        StepType::from(self.step_type)
    }

    pub fn is_empty(&self) -> bool {
        self.kind() == StepType::Empty
    }

    // Both halves are stored as 16-bit two's complement values
    fn pack(self) -> u32 {
        let note = self.note.clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16;
        let step_type = self.step_type.clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16;
        ((note as u32) << 16) | step_type as u32
    }

    fn unpack(bits: u32) -> Self {
        Self {
            note: ((bits >> 16) as u16) as i16 as i32,
            step_type: (bits as u16) as i16 as i32,
        }
    }
}

impl Default for PatternCell {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One step of an incoming pattern; may hold fewer than 8 notes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChordPatternStep {
    #[serde(default)]
    pub notes: Vec<PatternCell>,
}

/// Incoming chord pattern; may hold fewer than 16 steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChordPattern {
    #[serde(default)]
    pub steps: Vec<ChordPatternStep>,
}

impl ChordPattern {
    /// Cell at (step, slot) if the pattern defines it
    pub fn cell(&self, step: usize, slot: usize) -> Option<PatternCell> {
        self.steps.get(step)?.notes.get(slot).copied()
    }
}

/// Fixed grid shared between the control and audio threads
#[derive(Debug)]
pub struct PatternGrid {
    cells: [AtomicU32; PATTERN_STEPS * PATTERN_SLOTS],
}

impl PatternGrid {
    /// Create an all-empty grid
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn index(step: usize, slot: usize) -> Option<usize> {
        (step < PATTERN_STEPS && slot < PATTERN_SLOTS).then(|| step * PATTERN_SLOTS + slot)
    }

    /// Overwrite every cell; cells missing from `pattern` become empty
    pub fn set_pattern(&self, pattern: &ChordPattern) {
        for step in 0..PATTERN_STEPS {
            for slot in 0..PATTERN_SLOTS {
                let cell = pattern.cell(step, slot).unwrap_or(PatternCell::EMPTY);
                self.cells[step * PATTERN_SLOTS + slot].store(cell.pack(), Ordering::Release);
            }
        }
    }

    /// Write one cell. Out-of-range coordinates are ignored.
    pub fn set_cell(&self, step: usize, slot: usize, cell: PatternCell) -> bool {
        match Self::index(step, slot) {
            Some(index) => {
                self.cells[index].store(cell.pack(), Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Read one cell, `None` when out of range
    pub fn cell(&self, step: usize, slot: usize) -> Option<PatternCell> {
        Self::index(step, slot)
            .map(|index| PatternCell::unpack(self.cells[index].load(Ordering::Acquire)))
    }

    /// Reset every cell to the sentinel
    pub fn clear(&self) {
        self.set_pattern(&ChordPattern::default());
    }

    /// Copy of the whole grid as a pattern value
    pub fn snapshot(&self) -> ChordPattern {
        ChordPattern {
            steps: (0..PATTERN_STEPS)
                .map(|step| ChordPatternStep {
                    notes: (0..PATTERN_SLOTS)
                        .filter_map(|slot| self.cell(step, slot))
                        .collect(),
                })
                .collect(),
        }
    }
}

impl Default for PatternGrid {
    fn default() -> Self {
        let empty = PatternCell::EMPTY.pack();
        Self {
            cells: std::array::from_fn(|_| AtomicU32::new(empty)),
        }
    }
}
