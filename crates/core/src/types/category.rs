//! Snack categories offered by the AI selector dial.

use serde::{Deserialize, Serialize};

/// A category shown on the AI selector dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorCategory {
    EnergyFuel,
    BrainFuel,
    HydrationCheck,
    MusclePick,
}

impl SelectorCategory {
    /// All categories in dial order.
    pub const ALL: [Self; 4] = [
        Self::EnergyFuel,
        Self::BrainFuel,
        Self::HydrationCheck,
        Self::MusclePick,
    ];

    /// Category highlighted when the selector opens.
    pub const DEFAULT_ACTIVE: usize = 3;

    /// Catalog category label.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::EnergyFuel => "Energy Fuel",
            Self::BrainFuel => "Brain Fuel",
            Self::HydrationCheck => "Hydration Check",
            Self::MusclePick => "Muscle Pick",
        }
    }

    /// Image slug under `/static/images/`.
    #[must_use]
    pub const fn image_slug(&self) -> &'static str {
        match self {
            Self::EnergyFuel => "energy_fuel",
            Self::BrainFuel => "brain_fuel",
            Self::HydrationCheck => "hydration_check",
            Self::MusclePick => "muscle_pick",
        }
    }
}

/// Where a category sits on the dial relative to the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialPosition {
    Right,
    Bottom,
    Left,
    Top,
}

impl DialPosition {
    const ORDER: [Self; 4] = [Self::Right, Self::Bottom, Self::Left, Self::Top];

    /// CSS class suffix for templates.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Top => "top",
        }
    }
}

/// One entry of the rendered dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialSlot {
    pub index: usize,
    pub category: SelectorCategory,
    pub position: DialPosition,
}

impl DialSlot {
    /// The active slot is the one rotated to the right-hand side.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.position == DialPosition::Right
    }
}

/// Lay out the dial with `active` rotated to the right-hand position.
///
/// Out-of-range indices wrap around.
#[must_use]
#[allow(clippy::indexing_slicing)] // index is reduced modulo the dial size
pub fn dial_layout(active: usize) -> Vec<DialSlot> {
    let n = SelectorCategory::ALL.len();
    let active = active % n;
    SelectorCategory::ALL
        .iter()
        .enumerate()
        .map(|(index, &category)| DialSlot {
            index,
            category,
            position: DialPosition::ORDER[(index + n - active) % n],
        })
        .collect()
}
