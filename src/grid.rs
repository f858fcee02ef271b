//! Weekly capacity grid: the 7 day x 2 shift staging area used to edit the capacity
//! of one room before it is reconciled against the persisted slots.
//!
//! Cells hold raw text exactly as typed. A cell counts as filled only when its text
//! starts with a positive integer; anything else (blank, zero, negative, non-numeric)
//! means "no shift that day".

use crate::models::cadastros::{CapacidadeSala, DiaSemana, SalaId, Turno};
use crate::utils::parse_leading_int;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub dia_semana: DiaSemana,
    pub manha: String,
    pub tarde: String,
}

impl GridRow {
    fn blank(dia_semana: DiaSemana) -> Self {
        GridRow {
            dia_semana,
            manha: String::new(),
            tarde: String::new(),
        }
    }

    pub fn cell(&self, turno: Turno) -> &str {
        match turno {
            Turno::Manha => &self.manha,
            Turno::Tarde => &self.tarde,
        }
    }

    fn cell_mut(&mut self, turno: Turno) -> &mut String {
        match turno {
            Turno::Manha => &mut self.manha,
            Turno::Tarde => &mut self.tarde,
        }
    }
}

/// Parse a cell: `Some(n)` for a positive integer, `None` otherwise.
pub fn parse_capacity(raw: &str) -> Option<u32> {
    let value = parse_leading_int(raw)?;
    if value <= 0 {
        return None;
    }
    Some(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Always exactly seven rows, Monday first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyGrid {
    rows: [GridRow; 7],
}

impl Default for WeeklyGrid {
    fn default() -> Self {
        Self::blank()
    }
}

impl WeeklyGrid {
    pub fn blank() -> Self {
        WeeklyGrid {
            rows: DiaSemana::ALL.map(GridRow::blank),
        }
    }

    /// Pre-fill from the persisted slots of `sala`, so an untouched grid matches the
    /// saved state. Special-date slots (no weekday) are not part of the grid.
    pub fn from_slots(sala: SalaId, slots: &[CapacidadeSala]) -> Self {
        let mut grid = Self::blank();
        for slot in slots.iter().filter(|s| s.sala == sala) {
            if let Some(dia) = slot.dia_semana {
                grid.set(dia, slot.turno, slot.capacidade.to_string());
            }
        }
        grid
    }

    /// "Seg-Sex 1/turno": Monday to Friday get 1 in both shifts, the weekend is blanked.
    pub fn fill_default(&mut self) {
        for row in &mut self.rows {
            let value = if row.dia_semana.is_weekday() { "1" } else { "" };
            row.manha = value.to_string();
            row.tarde = value.to_string();
        }
    }

    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.manha.clear();
            row.tarde.clear();
        }
    }

    pub fn set(&mut self, dia: DiaSemana, turno: Turno, value: impl Into<String>) {
        *self.rows[dia.index() as usize].cell_mut(turno) = value.into();
    }

    pub fn get(&self, dia: DiaSemana, turno: Turno) -> &str {
        self.rows[dia.index() as usize].cell(turno)
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    /// All 14 cells, day-major.
    pub fn cells(&self) -> impl Iterator<Item = (DiaSemana, Turno, &str)> + '_ {
        self.rows
            .iter()
            .flat_map(|row| Turno::ALL.into_iter().map(move |t| (row.dia_semana, t, row.cell(t))))
    }

    /// Sum of the positive values currently typed into the grid (un-submitted).
    pub fn filled_total(&self) -> u32 {
        self.cells()
            .filter_map(|(_, _, raw)| parse_capacity(raw))
            .fold(0u32, u32::saturating_add)
    }

    /// Apply a `DAY:SHIFT=VALUE` edit, e.g. `0:manha=2`, `sex:tarde=` (clears the cell).
    /// DAY is 0-6 (Monday first) or a Portuguese short name.
    pub fn apply_edit(&mut self, edit: &str) -> Result<(), String> {
        let (target, value) = edit
            .split_once('=')
            .ok_or_else(|| format!("invalid cell edit '{}': expected DAY:SHIFT=VALUE", edit))?;
        let (day, shift) = target
            .split_once(':')
            .ok_or_else(|| format!("invalid cell edit '{}': expected DAY:SHIFT=VALUE", edit))?;
        let dia = parse_day(day)?;
        let turno: Turno = shift.parse()?;
        self.set(dia, turno, value.trim());
        Ok(())
    }
}

fn parse_day(raw: &str) -> Result<DiaSemana, String> {
    let raw = raw.trim().to_lowercase();
    if let Ok(n) = raw.parse::<u8>() {
        return DiaSemana::try_from(n);
    }
    let index = match raw.as_str() {
        "seg" => 0,
        "ter" => 1,
        "qua" => 2,
        "qui" => 3,
        "sex" => 4,
        "sab" | "sáb" => 5,
        "dom" => 6,
        other => return Err(format!("unknown day '{}': use 0-6 or seg..dom", other)),
    };
    DiaSemana::try_from(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cadastros::CapacidadeId;

    fn day(n: u8) -> DiaSemana {
        DiaSemana::try_from(n).expect("valid day")
    }

    #[test]
    fn parse_capacity_follows_leading_integer_rules() {
        assert_eq!(parse_capacity("3"), Some(3));
        assert_eq!(parse_capacity(" 4 "), Some(4));
        assert_eq!(parse_capacity("2 salas"), Some(2));
        assert_eq!(parse_capacity(""), None);
        assert_eq!(parse_capacity("0"), None);
        assert_eq!(parse_capacity("-1"), None);
        assert_eq!(parse_capacity("abc"), None);
        assert_eq!(parse_capacity("99999999999"), Some(u32::MAX));
    }

    #[test]
    fn default_fill_is_weekdays_only() {
        let mut grid = WeeklyGrid::blank();
        grid.fill_default();
        assert_eq!(grid.filled_total(), 10);
        assert_eq!(grid.get(day(4), Turno::Tarde), "1");
        assert_eq!(grid.get(day(5), Turno::Manha), "");
        assert_eq!(grid.get(day(6), Turno::Tarde), "");
    }

    #[test]
    fn clear_blanks_every_cell() {
        let mut grid = WeeklyGrid::blank();
        grid.fill_default();
        grid.set(day(6), Turno::Manha, "3");
        grid.clear();
        assert_eq!(grid, WeeklyGrid::blank());
        assert_eq!(grid.filled_total(), 0);
    }

    #[test]
    fn filled_total_ignores_non_positive_cells() {
        let mut grid = WeeklyGrid::blank();
        grid.set(day(0), Turno::Manha, "2");
        grid.set(day(0), Turno::Tarde, "0");
        grid.set(day(1), Turno::Manha, "-3");
        grid.set(day(2), Turno::Tarde, "x");
        grid.set(day(3), Turno::Tarde, "5");
        assert_eq!(grid.filled_total(), 7);
    }

    #[test]
    fn from_slots_prefills_only_the_selected_room() {
        let slots = vec![
            CapacidadeSala {
                id: CapacidadeId(1),
                sala: SalaId(3),
                dia_semana: Some(day(2)),
                turno: Turno::Manha,
                capacidade: 2,
                restricoes: String::new(),
            },
            CapacidadeSala {
                id: CapacidadeId(2),
                sala: SalaId(4),
                dia_semana: Some(day(2)),
                turno: Turno::Tarde,
                capacidade: 5,
                restricoes: String::new(),
            },
            CapacidadeSala {
                id: CapacidadeId(3),
                sala: SalaId(3),
                dia_semana: None,
                turno: Turno::Tarde,
                capacidade: 9,
                restricoes: String::new(),
            },
        ];
        let grid = WeeklyGrid::from_slots(SalaId(3), &slots);
        assert_eq!(grid.get(day(2), Turno::Manha), "2");
        assert_eq!(grid.get(day(2), Turno::Tarde), "");
        assert_eq!(grid.filled_total(), 2);
    }

    #[test]
    fn cells_are_day_major_and_complete() {
        let grid = WeeklyGrid::blank();
        let cells: Vec<_> = grid.cells().map(|(d, t, _)| (d.index(), t)).collect();
        assert_eq!(cells.len(), 14);
        assert_eq!(cells[0], (0, Turno::Manha));
        assert_eq!(cells[1], (0, Turno::Tarde));
        assert_eq!(cells[13], (6, Turno::Tarde));
    }

    #[test]
    fn apply_edit_parses_day_names_and_numbers() {
        let mut grid = WeeklyGrid::blank();
        grid.apply_edit("sex:tarde=3").expect("valid edit");
        grid.apply_edit("0:manha=2").expect("valid edit");
        assert_eq!(grid.get(day(4), Turno::Tarde), "3");
        assert_eq!(grid.get(day(0), Turno::Manha), "2");

        grid.apply_edit("sex:tarde=").expect("clearing edit");
        assert_eq!(grid.get(day(4), Turno::Tarde), "");

        assert!(grid.apply_edit("8:manha=1").is_err());
        assert!(grid.apply_edit("seg:noite=1").is_err());
        assert!(grid.apply_edit("seg-manha-1").is_err());
    }
}
