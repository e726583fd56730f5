//! Coordinate snapping: every vertex rounded to 3 decimal places, consecutive
//! duplicates collapsed. Applying it twice is a no-op.

use geo::{Coord, LineString};

use crate::geometry::round3;

pub fn snap_coordinates(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    lines
        .into_iter()
        .filter_map(|line| {
            let mut out: Vec<Coord<f64>> = Vec::with_capacity(line.0.len());
            for c in &line.0 {
                let rounded = Coord {
                    x: round3(c.x),
                    y: round3(c.y),
                };
                if out.last() != Some(&rounded) {
                    out.push(rounded);
                }
            }
            if out.len() < 2 {
                return None;
            }
            Some(LineString::new(out))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_and_dedups() {
        let lines = vec![LineString::from(vec![
            (0.00012, 0.0),
            (0.0001, 0.0),
            (5.00049, 0.0),
        ])];
        let snapped = snap_coordinates(lines);
        assert_eq!(snapped.len(), 1);
        assert_eq!(snapped[0].0.len(), 2);
        assert_eq!(snapped[0].0[1], Coord { x: 5.0, y: 0.0 });
    }

    #[test]
    fn degenerate_line_is_dropped() {
        let lines = vec![LineString::from(vec![(0.0001, 0.0), (0.0002, 0.0)])];
        assert!(snap_coordinates(lines).is_empty());
    }

    #[test]
    fn snapping_twice_equals_once() {
        let lines = vec![LineString::from(vec![
            (0.1234567, 9.87654),
            (3.3333333, 4.4444444),
            (7.77777, 8.88888),
        ])];
        let once = snap_coordinates(lines);
        let twice = snap_coordinates(once.clone());
        assert_eq!(once, twice);
    }
}
