// Command types - Communication control thread → audio thread

use crate::sequencer::model::ModelEdit;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Change to the sequence model
    Edit(ModelEdit),
    /// Playhead back to beat 0, sequenced notes released
    Rewind,
    /// Switch `PlayNote` between latching keys and sounding notes
    SetRepeating(bool),
    PlayNote { note: u8, velocity: u8 },
    StopNote { note: u8 },
}

impl From<ModelEdit> for Command {
    fn from(edit: ModelEdit) -> Self {
        Command::Edit(edit)
    }
}
