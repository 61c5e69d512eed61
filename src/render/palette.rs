use plotters::style::RGBColor;

use crate::index::{LifeHistory, Zone};

pub const SAFE: RGBColor = RGBColor(46, 139, 87);
pub const CAUTION: RGBColor = RGBColor(240, 180, 0);
pub const WARNING: RGBColor = RGBColor(255, 127, 14);
pub const DANGER: RGBColor = RGBColor(214, 39, 40);

/// Vertical marker for a known collapse year
pub const COLLAPSE_MARKER: RGBColor = RGBColor(120, 0, 0);

pub fn zone_color(zone: Zone) -> RGBColor {
    match zone {
        Zone::Safe => SAFE,
        Zone::Caution => CAUTION,
        Zone::Warning => WARNING,
        Zone::Danger => DANGER,
    }
}

pub fn category_color(category: LifeHistory) -> RGBColor {
    match category {
        LifeHistory::LongLived => RGBColor(31, 119, 180),
        LifeHistory::Medium => RGBColor(44, 160, 44),
        LifeHistory::ModerateTurnover => RGBColor(148, 103, 189),
        LifeHistory::FastTurnover => RGBColor(140, 86, 75),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_are_distinct() {
        let zones: Vec<RGBColor> = Zone::ALL.iter().map(|z| zone_color(*z)).collect();
        let categories: Vec<RGBColor> =
            LifeHistory::ALL.iter().map(|c| category_color(*c)).collect();

        for set in [&zones, &categories] {
            for (i, a) in set.iter().enumerate() {
                for b in &set[i + 1..] {
                    assert_ne!((a.0, a.1, a.2), (b.0, b.1, b.2));
                }
            }
        }
        assert_eq!(zone_color(Zone::Danger).0, 214);
    }
}
