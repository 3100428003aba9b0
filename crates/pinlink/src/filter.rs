//! Wildcard filters over pin updates.
//!
//! A [`PinFilter`] describes the update a caller is waiting for: each field
//! either requires an exact value or accepts anything. The same field rule is
//! used for matching incoming [`PinUpdate`] records and for detecting
//! ambiguous filter pairs before a wait starts.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{PinId, PinMode, PinState, PinUpdate};

/// One filter field: an exact expectation or a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterField<T> {
    /// Matches any value.
    Any,
    /// Matches exactly this value.
    Exact(T),
}

// Hand-written so the wildcard default does not demand `T: Default`.
impl<T> Default for FilterField<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T: PartialEq> FilterField<T> {
    /// Whether a concrete value satisfies this field.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == value,
        }
    }

    /// Whether another filter's field satisfies this field.
    ///
    /// A wildcard on the left accepts anything; an exact expectation is only
    /// satisfied by the same exact expectation on the right.
    fn accepts_field(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Exact(_), Self::Any) => false,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl<T> From<T> for FilterField<T> {
    fn from(value: T) -> Self {
        Self::Exact(value)
    }
}

impl<T: std::fmt::Display> std::fmt::Display for FilterField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(value) => value.fmt(f),
        }
    }
}

/// Wildcard-capable predicate over a pin update.
///
/// Matching is field-conjunctive: every non-wildcard field must equal the
/// corresponding field of the update; wildcard fields are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinFilter {
    #[serde(default)]
    pub pin: FilterField<PinId>,
    #[serde(default)]
    pub mode: FilterField<PinMode>,
    #[serde(default)]
    pub state: FilterField<PinState>,
}

impl PinFilter {
    /// Filter accepting every update. Only meaningful alone in a wait set;
    /// paired with anything else it is rejected as a conflict.
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter constrained to one pin, mode and state unconstrained.
    pub fn for_pin(pin: PinId) -> Self {
        Self {
            pin: FilterField::Exact(pin),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: PinMode) -> Self {
        self.mode = FilterField::Exact(mode);
        self
    }

    pub fn with_state(mut self, state: PinState) -> Self {
        self.state = FilterField::Exact(state);
        self
    }

    /// Whether an update record satisfies this filter.
    pub fn matches(&self, update: &PinUpdate) -> bool {
        self.pin.accepts(&update.pin)
            && self.mode.accepts(&update.mode)
            && self.state.accepts(&update.state)
    }

    /// Whether another filter satisfies this filter, field by field, under
    /// the same rule as [`matches`](Self::matches). Used for conflict
    /// detection only, never for correlation.
    pub fn matches_filter(&self, other: &Self) -> bool {
        self.pin.accepts_field(&other.pin)
            && self.mode.accepts_field(&other.mode)
            && self.state.accepts_field(&other.state)
    }

    /// Whether two filters could both be satisfied ambiguously. Symmetric:
    /// a match in either direction is a conflict.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.matches_filter(other) || other.matches_filter(self)
    }

    /// True when every field is a wildcard.
    pub fn is_unconstrained(&self) -> bool {
        self.pin.is_any() && self.mode.is_any() && self.state.is_any()
    }
}

impl std::fmt::Display for PinFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(pin={}, mode={}, state={})",
            self.pin, self.mode, self.state
        )
    }
}

/// Verify that no two filters in a wait set overlap.
///
/// Exhaustive pairwise check; fails fast with the first offending pair. Runs
/// before any publish so an ambiguous set never reaches the wire.
pub fn check_conflicts(filters: &[PinFilter]) -> Result<(), Error> {
    for (i, first) in filters.iter().enumerate() {
        for second in &filters[i + 1..] {
            if first.conflicts_with(second) {
                return Err(Error::FilterConflict {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    const PINS: [PinId; 6] = [
        PinId::Relay1,
        PinId::Relay2,
        PinId::Output1,
        PinId::Output2,
        PinId::Input1,
        PinId::Input2,
    ];
    const MODES: [PinMode; 4] = [
        PinMode::Input,
        PinMode::Output,
        PinMode::InputPullup,
        PinMode::Disabled,
    ];
    const STATES: [PinState; 2] = [PinState::Low, PinState::High];

    fn random_update(rng: &mut impl Rng) -> PinUpdate {
        PinUpdate::new(
            *PINS.choose(rng).unwrap(),
            *MODES.choose(rng).unwrap(),
            *STATES.choose(rng).unwrap(),
        )
    }

    fn random_filter(rng: &mut impl Rng) -> PinFilter {
        let mut filter = PinFilter::any();
        if rng.gen_bool(0.5) {
            filter.pin = FilterField::Exact(*PINS.choose(rng).unwrap());
        }
        if rng.gen_bool(0.5) {
            filter.mode = FilterField::Exact(*MODES.choose(rng).unwrap());
        }
        if rng.gen_bool(0.5) {
            filter.state = FilterField::Exact(*STATES.choose(rng).unwrap());
        }
        filter
    }

    /// Reference conjunction, written out field by field.
    fn reference_matches(filter: &PinFilter, update: &PinUpdate) -> bool {
        if let FilterField::Exact(pin) = filter.pin {
            if pin != update.pin {
                return false;
            }
        }
        if let FilterField::Exact(mode) = filter.mode {
            if mode != update.mode {
                return false;
            }
        }
        if let FilterField::Exact(state) = filter.state {
            if state != update.state {
                return false;
            }
        }
        true
    }

    #[test]
    fn wildcard_filter_matches_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        let filter = PinFilter::any();
        for _ in 0..200 {
            assert!(filter.matches(&random_update(&mut rng)));
        }
    }

    #[test]
    fn matching_is_field_conjunctive() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let filter = random_filter(&mut rng);
            let update = random_update(&mut rng);
            assert_eq!(
                filter.matches(&update),
                reference_matches(&filter, &update),
                "filter {} vs {:?}",
                filter,
                update
            );
        }
    }

    #[test]
    fn exact_filter_requires_all_fields() {
        let filter = PinFilter::for_pin(PinId::Relay1)
            .with_mode(PinMode::Output)
            .with_state(PinState::High);

        let mut update = PinUpdate::new(PinId::Relay1, PinMode::Output, PinState::High);
        assert!(filter.matches(&update));

        update.state = PinState::Low;
        assert!(!filter.matches(&update));
    }

    #[test]
    fn conflict_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..500 {
            let a = random_filter(&mut rng);
            let b = random_filter(&mut rng);
            assert_eq!(a.conflicts_with(&b), b.conflicts_with(&a));
        }
    }

    #[test]
    fn overlapping_pair_is_rejected_regardless_of_order() {
        let narrow = PinFilter::for_pin(PinId::Relay1).with_state(PinState::High);
        let wide = PinFilter::for_pin(PinId::Relay1);

        assert!(narrow.conflicts_with(&wide));
        assert!(check_conflicts(&[narrow.clone(), wide.clone()]).is_err());
        assert!(check_conflicts(&[wide, narrow]).is_err());
    }

    #[test]
    fn unconstrained_filter_conflicts_with_any_other() {
        let wildcard = PinFilter::any();
        let other = PinFilter::for_pin(PinId::Input2).with_state(PinState::Low);
        assert!(wildcard.conflicts_with(&other));
        assert!(check_conflicts(&[wildcard, other]).is_err());
    }

    #[test]
    fn disjoint_filters_pass() {
        let filters = [
            PinFilter::for_pin(PinId::Relay1).with_state(PinState::High),
            PinFilter::for_pin(PinId::Relay2).with_state(PinState::Low),
            PinFilter::for_pin(PinId::Input1),
        ];
        assert!(check_conflicts(&filters).is_ok());
    }

    #[test]
    fn single_filter_never_conflicts() {
        assert!(check_conflicts(&[PinFilter::any()]).is_ok());
        assert!(check_conflicts(&[]).is_ok());
    }

    #[test]
    fn filter_display_marks_wildcards() {
        let filter = PinFilter::for_pin(PinId::Relay1).with_state(PinState::High);
        assert_eq!(filter.to_string(), "(pin=RELAY_1, mode=*, state=HIGH)");
    }
}
