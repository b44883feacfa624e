use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::session::SessionStatusResponse, state::game::Action};

/// Control-pad grid; `.` marks an empty cell.
pub const PAD_LAYOUT: [&str; 3] = [".^...", "<.>ab", ".v.sS"];

/// One cell of the control pad.
#[derive(Debug, Serialize, ToSchema)]
pub struct PadButton {
    pub action: Action,
    pub label: String,
}

/// Everything a participant page needs to render.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayResponse {
    pub status: SessionStatusResponse,
    pub frame_url: String,
    /// Rows of the pad; `None` for empty cells.
    pub pad: Vec<Vec<Option<PadButton>>>,
}

fn pad_cell(symbol: char) -> Option<Action> {
    match symbol {
        '^' => Some(Action::Up),
        'v' => Some(Action::Down),
        '<' => Some(Action::Left),
        '>' => Some(Action::Right),
        'a' => Some(Action::A),
        'b' => Some(Action::B),
        's' => Some(Action::Select),
        'S' => Some(Action::Start),
        _ => None,
    }
}

/// Pad rows built from [`PAD_LAYOUT`].
pub fn pad_rows() -> Vec<Vec<Option<PadButton>>> {
    PAD_LAYOUT
        .iter()
        .map(|row| {
            row.chars()
                .map(|symbol| {
                    pad_cell(symbol).map(|action| PadButton {
                        action,
                        label: action.as_str().to_uppercase(),
                    })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_has_every_button_once() {
        let rows = pad_rows();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 5));

        let mut actions: Vec<Action> = rows
            .iter()
            .flatten()
            .filter_map(|cell| cell.as_ref().map(|b| b.action))
            .collect();
        actions.sort();
        actions.dedup();
        assert_eq!(actions.len(), Action::ALL.len());

        let up = rows[0][1].as_ref().unwrap();
        assert_eq!(up.action, Action::Up);
        assert_eq!(up.label, "UP");
    }
}
