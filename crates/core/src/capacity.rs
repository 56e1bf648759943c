//! Removable drive capacities and selection fit estimation.

use serde::{Deserialize, Serialize};

/// Nominal drive sizes offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveCapacity {
    /// 8 GB
    Gb8,
    /// 16 GB
    Gb16,
    /// 32 GB
    Gb32,
    /// 64 GB
    Gb64,
    /// 128 GB
    Gb128,
    /// 256 GB
    Gb256,
}

impl DriveCapacity {
    /// Every choice in ascending order.
    pub const ALL: [DriveCapacity; 6] = [
        DriveCapacity::Gb8,
        DriveCapacity::Gb16,
        DriveCapacity::Gb32,
        DriveCapacity::Gb64,
        DriveCapacity::Gb128,
        DriveCapacity::Gb256,
    ];

    /// Size printed on the packaging.
    pub fn nominal_gb(self) -> u32 {
        match self {
            DriveCapacity::Gb8 => 8,
            DriveCapacity::Gb16 => 16,
            DriveCapacity::Gb32 => 32,
            DriveCapacity::Gb64 => 64,
            DriveCapacity::Gb128 => 128,
            DriveCapacity::Gb256 => 256,
        }
    }

    /// Space actually usable once formatted.
    pub fn real_gb(self) -> f64 {
        match self {
            DriveCapacity::Gb8 => 7.45,
            DriveCapacity::Gb16 => 14.9,
            DriveCapacity::Gb32 => 29.8,
            DriveCapacity::Gb64 => 59.6,
            DriveCapacity::Gb128 => 119.2,
            DriveCapacity::Gb256 => 238.4,
        }
    }

    /// Pick `self` unless it is already `current`, in which case clear the choice.
    pub fn toggle(self, current: Option<Self>) -> Option<Self> {
        if current == Some(self) {
            None
        } else {
            Some(self)
        }
    }
}

/// How a selection total compares with the chosen drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityEstimate {
    /// Selection total rounded to two decimals.
    pub total_gb: f64,
    /// Chosen drive, if any.
    pub capacity: Option<DriveCapacity>,
    /// Whether the total does not fit on the chosen drive.
    pub exceeded: bool,
    /// Share of the drive in use, capped at 100.
    pub usage_percent: f64,
}

impl CapacityEstimate {
    /// Compare `total_gb` against `capacity`.
    pub fn new(total_gb: f64, capacity: Option<DriveCapacity>) -> Self {
        let total_gb = (total_gb * 100.0).round() / 100.0;
        let (exceeded, usage_percent) = match capacity {
            Some(choice) => {
                let real = choice.real_gb();
                (total_gb > real, (total_gb / real * 100.0).min(100.0))
            }
            None => (false, 0.0),
        };
        Self {
            total_gb,
            capacity,
            exceeded,
            usage_percent,
        }
    }

    /// Usable space left on the drive, never negative.
    pub fn remaining_gb(&self) -> Option<f64> {
        self.capacity
            .map(|choice| (choice.real_gb() - self.total_gb).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_capacity_never_exceeds() {
        let estimate = CapacityEstimate::new(10_000.0, None);
        assert!(!estimate.exceeded);
        assert_eq!(estimate.usage_percent, 0.0);
        assert_eq!(estimate.remaining_gb(), None);
    }

    #[test]
    fn exceeded_requires_strictly_greater_total() {
        let at_limit = CapacityEstimate::new(7.45, Some(DriveCapacity::Gb8));
        assert!(!at_limit.exceeded);
        assert_eq!(at_limit.usage_percent, 100.0);

        let over = CapacityEstimate::new(7.46, Some(DriveCapacity::Gb8));
        assert!(over.exceeded);
        assert_eq!(over.usage_percent, 100.0);
        assert_eq!(over.remaining_gb(), Some(0.0));
    }

    #[test]
    fn small_selection_fits_eight_gigabytes() {
        let estimate = CapacityEstimate::new(4.0 + 1.2, Some(DriveCapacity::Gb8));
        assert!(!estimate.exceeded);
        assert!((estimate.usage_percent - 69.798).abs() < 0.01);
    }

    #[test]
    fn choices_toggle_and_resolve() {
        assert_eq!(DriveCapacity::Gb16.toggle(None), Some(DriveCapacity::Gb16));
        assert_eq!(DriveCapacity::Gb16.toggle(Some(DriveCapacity::Gb16)), None);
        assert_eq!(
            DriveCapacity::Gb32.toggle(Some(DriveCapacity::Gb16)),
            Some(DriveCapacity::Gb32)
        );
    }
}
