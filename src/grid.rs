use crate::types::{Instrument, Timeframe};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub instrument: Instrument,
    pub timeframe: Timeframe,
}

/// Static instrument × timeframe cross-product, iterated instrument-major.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanGrid {
    instruments: Vec<Instrument>,
    timeframes: Vec<Timeframe>,
}

impl ScanGrid {
    pub fn new(instruments: Vec<Instrument>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            instruments,
            timeframes,
        }
    }

    pub fn len(&self) -> usize {
        self.instruments.len() * self.timeframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.instruments.iter().flat_map(move |instrument| {
            self.timeframes.iter().map(move |&timeframe| GridCell {
                instrument: instrument.clone(),
                timeframe,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_instrument_major() {
        let grid = ScanGrid::new(
            vec![Instrument::new("A", "a"), Instrument::new("B", "b")],
            vec![Timeframe::M1, Timeframe::H4],
        );
        let cells: Vec<(String, Timeframe)> = grid
            .cells()
            .map(|c| (c.instrument.name, c.timeframe))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("A".to_string(), Timeframe::M1),
                ("A".to_string(), Timeframe::H4),
                ("B".to_string(), Timeframe::M1),
                ("B".to_string(), Timeframe::H4),
            ]
        );
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn empty_axis_gives_empty_grid() {
        let grid = ScanGrid::new(vec![Instrument::new("A", "a")], vec![]);
        assert!(grid.is_empty());
        assert_eq!(grid.cells().count(), 0);
    }
}
