//! Grid configuration bounds and validation
//!
//! Pure functions used while a user fills in a new grid strategy. The draft
//! keeps the raw text of every field; editing one bound derives the other
//! symmetrically around the current market price.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fewest grid levels a bot may run with
pub const MIN_GRID_LEVELS: u32 = 2;
pub const MAX_GRID_LEVELS: u32 = 100;

/// Grid direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    /// Side of the current price a stop-loss must sit on
    fn loss_side(self) -> &'static str {
        match self {
            Direction::Long => "below",
            Direction::Short => "above",
        }
    }

    /// Side of the current price a take-profit must sit on
    fn profit_side(self) -> &'static str {
        match self {
            Direction::Long => "above",
            Direction::Short => "below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{}', expected long or short", other)),
        }
    }
}

/// Level spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridType {
    #[default]
    Arithmetic,
    Geometric,
}

impl FromStr for GridType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arithmetic" => Ok(GridType::Arithmetic),
            "geometric" => Ok(GridType::Geometric),
            other => Err(format!(
                "unknown grid type '{}', expected arithmetic or geometric",
                other
            )),
        }
    }
}

/// Draft fields, used to label validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    UpperBound,
    LowerBound,
    GridRatio,
    GridLevels,
    TotalMargin,
    StopBotPrice,
    StopTopPrice,
}

impl DraftField {
    fn allows_decimals(self) -> bool {
        !matches!(self, DraftField::GridLevels)
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::UpperBound => "upper bound",
            DraftField::LowerBound => "lower bound",
            DraftField::GridRatio => "grid ratio",
            DraftField::GridLevels => "grid levels",
            DraftField::TotalMargin => "total margin",
            DraftField::StopBotPrice => "stop-loss price",
            DraftField::StopTopPrice => "take-profit price",
        };
        f.write_str(name)
    }
}

/// Errors from deriving one bound from the other
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundError {
    #[error("current price must be greater than 0")]
    NoMarketPrice,

    #[error("upper bound must be above current price")]
    UpperNotAboveCurrent,

    #[error("lower bound must be below current price")]
    LowerNotBelowCurrent,

    #[error("lower bound must be greater than 0")]
    LowerNotPositive,
}

/// Field-scoped validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(DraftField),

    #[error("{0} must be a number")]
    NotANumber(DraftField),

    #[error("grid levels must be at least 2")]
    TooFewLevels,

    #[error("grid levels cannot exceed 100")]
    TooManyLevels,

    #[error("grid ratio must be between 0 and 1 (exclusive)")]
    RatioOutOfRange,

    #[error("total margin must be greater than 0")]
    MarginNotPositive,

    #[error("stop-loss price must be {} current price for a {} grid", .0.loss_side(), .0)]
    StopLossWrongSide(Direction),

    #[error("take-profit price must be {} current price for a {} grid", .0.profit_side(), .0)]
    TakeProfitWrongSide(Direction),

    #[error(transparent)]
    Bound(#[from] BoundError),
}

// =============================================================================
// Input sanitation
// =============================================================================

/// Digits with at most one decimal point (when allowed). Empty input passes.
pub fn accept_numeric_input(input: &str, allow_decimals: bool) -> bool {
    let mut seen_point = false;
    input.chars().all(|c| match c {
        '0'..='9' => true,
        '.' if allow_decimals && !seen_point => {
            seen_point = true;
            true
        }
        _ => false,
    })
}

/// Replace `field` with `input` if it passes sanitation. Returns whether it did.
pub fn apply_numeric_edit(field: &mut String, input: &str, allow_decimals: bool) -> bool {
    if !accept_numeric_input(input, allow_decimals) {
        return false;
    }
    field.clear();
    field.push_str(input);
    true
}

fn parse_number(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}

fn parse_field(raw: &str, field: DraftField) -> Result<Option<Decimal>, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_number(raw)
        .map(Some)
        .ok_or(ValidationError::NotANumber(field))
}

// =============================================================================
// Symmetric bound derivation
// =============================================================================

/// Round to cents and render with exactly two decimals, e.g. `80.00`.
pub fn format_price(value: Decimal) -> String {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Mirror `upper` around `current_price` to get the lower bound.
pub fn derive_lower_bound(upper: Decimal, current_price: Decimal) -> Result<Decimal, BoundError> {
    if current_price <= Decimal::ZERO {
        return Err(BoundError::NoMarketPrice);
    }
    if upper <= current_price {
        return Err(BoundError::UpperNotAboveCurrent);
    }
    let distance = upper - current_price;
    let lower = current_price - distance;
    if lower <= Decimal::ZERO {
        return Err(BoundError::LowerNotPositive);
    }
    Ok(lower)
}

/// Mirror `lower` around `current_price` to get the upper bound.
pub fn derive_upper_bound(lower: Decimal, current_price: Decimal) -> Result<Decimal, BoundError> {
    if current_price <= Decimal::ZERO {
        return Err(BoundError::NoMarketPrice);
    }
    if lower >= current_price {
        return Err(BoundError::LowerNotBelowCurrent);
    }
    if lower <= Decimal::ZERO {
        return Err(BoundError::LowerNotPositive);
    }
    let distance = current_price - lower;
    Ok(current_price + distance)
}

// =============================================================================
// Field validators
// =============================================================================
//
// Each validator is independent. An empty field is not an error here; the
// readiness check is what requires it.

/// Grid levels between [`MIN_GRID_LEVELS`] and [`MAX_GRID_LEVELS`] inclusive
pub fn validate_grid_levels(raw: &str) -> Result<(), ValidationError> {
    let Some(levels) = parse_field(raw, DraftField::GridLevels)? else {
        return Ok(());
    };
    if levels < Decimal::from(MIN_GRID_LEVELS) {
        return Err(ValidationError::TooFewLevels);
    }
    if levels > Decimal::from(MAX_GRID_LEVELS) {
        return Err(ValidationError::TooManyLevels);
    }
    Ok(())
}

/// Ratio strictly between 0 and 1. Arithmetic grids ignore the field.
pub fn validate_grid_ratio(raw: &str, grid_type: GridType) -> Result<(), ValidationError> {
    if grid_type == GridType::Arithmetic {
        return Ok(());
    }
    let Some(ratio) = parse_field(raw, DraftField::GridRatio)? else {
        return Ok(());
    };
    if ratio <= Decimal::ZERO || ratio >= Decimal::ONE {
        return Err(ValidationError::RatioOutOfRange);
    }
    Ok(())
}

/// Margin must be positive
pub fn validate_total_margin(raw: &str) -> Result<(), ValidationError> {
    let Some(margin) = parse_field(raw, DraftField::TotalMargin)? else {
        return Ok(());
    };
    if margin <= Decimal::ZERO {
        return Err(ValidationError::MarginNotPositive);
    }
    Ok(())
}

/// Stop-loss (`stop_bot_price`) must sit on the losing side of the market.
pub fn validate_stop_loss(
    raw: &str,
    direction: Direction,
    current_price: Decimal,
) -> Result<(), ValidationError> {
    let Some(price) = parse_field(raw, DraftField::StopBotPrice)? else {
        return Ok(());
    };
    let wrong_side = match direction {
        Direction::Long => price >= current_price,
        Direction::Short => price <= current_price,
    };
    if wrong_side {
        return Err(ValidationError::StopLossWrongSide(direction));
    }
    Ok(())
}

/// Take-profit (`stop_top_price`) must sit on the winning side of the market.
pub fn validate_take_profit(
    raw: &str,
    direction: Direction,
    current_price: Decimal,
) -> Result<(), ValidationError> {
    let Some(price) = parse_field(raw, DraftField::StopTopPrice)? else {
        return Ok(());
    };
    let wrong_side = match direction {
        Direction::Long => price <= current_price,
        Direction::Short => price >= current_price,
    };
    if wrong_side {
        return Err(ValidationError::TakeProfitWrongSide(direction));
    }
    Ok(())
}

// =============================================================================
// Draft
// =============================================================================

/// Typed, validated grid configuration ready to send to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub direction: Direction,
    pub upper_bound: Decimal,
    pub lower_bound: Decimal,
    pub grid_type: GridType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_ratio: Option<Decimal>,
    pub grid_levels: u32,
    pub total_margin: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_bot_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_top_price: Option<Decimal>,
}

/// A grid configuration being entered, field by field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridDraft {
    pub direction: Direction,
    pub grid_type: GridType,
    pub upper_bound: String,
    pub lower_bound: String,
    pub grid_ratio: String,
    pub grid_levels: String,
    pub total_margin: String,
    pub stop_bot_price: String,
    pub stop_top_price: String,
    bound_error: Option<BoundError>,
}

impl GridDraft {
    pub fn new(direction: Direction, grid_type: GridType) -> Self {
        Self {
            direction,
            grid_type,
            ..Default::default()
        }
    }

    /// Outstanding error from the last bound edit
    pub fn bound_error(&self) -> Option<&BoundError> {
        self.bound_error.as_ref()
    }

    /// Edit the upper bound; on a valid value the lower bound is derived.
    ///
    /// Returns `false` if the input was rejected by sanitation, in which case
    /// nothing changes.
    pub fn edit_upper_bound(&mut self, input: &str, current_price: Decimal) -> bool {
        if !apply_numeric_edit(&mut self.upper_bound, input, true) {
            return false;
        }
        self.bound_error = None;
        if let Some(upper) = parse_number(input) {
            match derive_lower_bound(upper, current_price) {
                Ok(lower) => self.lower_bound = format_price(lower),
                Err(err) => self.bound_error = Some(err),
            }
        }
        true
    }

    /// Edit the lower bound; on a valid value the upper bound is derived.
    pub fn edit_lower_bound(&mut self, input: &str, current_price: Decimal) -> bool {
        if !apply_numeric_edit(&mut self.lower_bound, input, true) {
            return false;
        }
        self.bound_error = None;
        if let Some(lower) = parse_number(input) {
            match derive_upper_bound(lower, current_price) {
                Ok(upper) => self.upper_bound = format_price(upper),
                Err(err) => self.bound_error = Some(err),
            }
        }
        true
    }

    /// Edit any non-bound field, subject to sanitation.
    pub fn edit_field(&mut self, field: DraftField, input: &str) -> bool {
        let allow_decimals = field.allows_decimals();
        let target = match field {
            DraftField::GridRatio => &mut self.grid_ratio,
            DraftField::GridLevels => &mut self.grid_levels,
            DraftField::TotalMargin => &mut self.total_margin,
            DraftField::StopBotPrice => &mut self.stop_bot_price,
            DraftField::StopTopPrice => &mut self.stop_top_price,
            DraftField::UpperBound => &mut self.upper_bound,
            DraftField::LowerBound => &mut self.lower_bound,
        };
        apply_numeric_edit(target, input, allow_decimals)
    }

    /// Run every field validator and collect the failures.
    pub fn field_errors(&self, current_price: Decimal) -> Vec<(DraftField, ValidationError)> {
        let checks = [
            (DraftField::GridLevels, validate_grid_levels(&self.grid_levels)),
            (
                DraftField::GridRatio,
                validate_grid_ratio(&self.grid_ratio, self.grid_type),
            ),
            (DraftField::TotalMargin, validate_total_margin(&self.total_margin)),
            (
                DraftField::StopBotPrice,
                validate_stop_loss(&self.stop_bot_price, self.direction, current_price),
            ),
            (
                DraftField::StopTopPrice,
                validate_take_profit(&self.stop_top_price, self.direction, current_price),
            ),
        ];

        checks
            .into_iter()
            .filter_map(|(field, result)| result.err().map(|err| (field, err)))
            .collect()
    }

    fn missing_fields(&self) -> Vec<DraftField> {
        let mut required = vec![
            (DraftField::UpperBound, &self.upper_bound),
            (DraftField::LowerBound, &self.lower_bound),
            (DraftField::GridLevels, &self.grid_levels),
            (DraftField::TotalMargin, &self.total_margin),
        ];
        if self.grid_type == GridType::Geometric {
            required.push((DraftField::GridRatio, &self.grid_ratio));
        }
        required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect()
    }

    /// Whether the submit action may be enabled.
    pub fn is_submittable(&self, current_price: Decimal) -> bool {
        self.missing_fields().is_empty()
            && self.bound_error.is_none()
            && self.field_errors(current_price).is_empty()
    }

    /// Convert into a typed config, re-checking the bounds against the
    /// current price since the market may have moved since they were entered.
    pub fn build(&self, current_price: Decimal) -> Result<GridConfig, Vec<ValidationError>> {
        let mut errors: Vec<ValidationError> = self
            .missing_fields()
            .into_iter()
            .map(ValidationError::Missing)
            .collect();
        if let Some(err) = &self.bound_error {
            errors.push(err.clone().into());
        }
        errors.extend(self.field_errors(current_price).into_iter().map(|(_, e)| e));
        if !errors.is_empty() {
            return Err(errors);
        }

        let number = |raw: &str, field: DraftField| {
            parse_number(raw).ok_or(ValidationError::NotANumber(field))
        };
        let optional = |raw: &str, field: DraftField| parse_field(raw, field);

        let upper = number(&self.upper_bound, DraftField::UpperBound);
        let lower = number(&self.lower_bound, DraftField::LowerBound);
        let levels = number(&self.grid_levels, DraftField::GridLevels);
        let margin = number(&self.total_margin, DraftField::TotalMargin);
        let ratio = optional(&self.grid_ratio, DraftField::GridRatio);
        let stop_bot = optional(&self.stop_bot_price, DraftField::StopBotPrice);
        let stop_top = optional(&self.stop_top_price, DraftField::StopTopPrice);

        match (upper, lower, levels, margin, ratio, stop_bot, stop_top) {
            (Ok(upper), Ok(lower), Ok(levels), Ok(margin), Ok(ratio), Ok(stop_bot), Ok(stop_top)) => {
                if upper <= current_price {
                    errors.push(BoundError::UpperNotAboveCurrent.into());
                }
                if lower >= current_price {
                    errors.push(BoundError::LowerNotBelowCurrent.into());
                }
                if lower <= Decimal::ZERO {
                    errors.push(BoundError::LowerNotPositive.into());
                }
                let grid_levels = levels.to_u32().ok_or(ValidationError::TooManyLevels);
                match grid_levels {
                    Ok(grid_levels) if errors.is_empty() => Ok(GridConfig {
                        direction: self.direction,
                        upper_bound: upper,
                        lower_bound: lower,
                        grid_type: self.grid_type,
                        grid_ratio: match self.grid_type {
                            GridType::Geometric => ratio,
                            GridType::Arithmetic => None,
                        },
                        grid_levels,
                        total_margin: margin,
                        stop_bot_price: stop_bot,
                        stop_top_price: stop_top,
                    }),
                    Ok(_) => Err(errors),
                    Err(err) => {
                        errors.push(err);
                        Err(errors)
                    }
                }
            }
            (upper, lower, levels, margin, ratio, stop_bot, stop_top) => {
                errors.extend(upper.err());
                errors.extend(lower.err());
                errors.extend(levels.err());
                errors.extend(margin.err());
                errors.extend(ratio.err());
                errors.extend(stop_bot.err());
                errors.extend(stop_top.err());
                Err(errors)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ready_draft(current: Decimal) -> GridDraft {
        let mut draft = GridDraft::new(Direction::Long, GridType::Arithmetic);
        assert!(draft.edit_upper_bound("120", current));
        assert!(draft.edit_field(DraftField::GridLevels, "10"));
        assert!(draft.edit_field(DraftField::TotalMargin, "500"));
        draft
    }

    #[test]
    fn test_numeric_sanitation() {
        assert!(accept_numeric_input("123.45", true));
        assert!(accept_numeric_input("", true));
        assert!(accept_numeric_input("12.", true));
        assert!(!accept_numeric_input("1.2.3", true));
        assert!(!accept_numeric_input("12a", true));
        assert!(!accept_numeric_input("-5", true));
        assert!(!accept_numeric_input("1.5", false));
        assert!(accept_numeric_input("15", false));
    }

    #[test]
    fn test_rejected_edit_leaves_field_unchanged() {
        let mut field = "42".to_string();
        assert!(!apply_numeric_edit(&mut field, "42x", true));
        assert_eq!(field, "42");
        assert!(apply_numeric_edit(&mut field, "42.5", true));
        assert_eq!(field, "42.5");
    }

    #[test]
    fn test_upper_edit_derives_lower() {
        let mut draft = GridDraft::default();
        assert!(draft.edit_upper_bound("120", dec!(100)));
        assert_eq!(draft.lower_bound, "80.00");
        assert!(draft.bound_error().is_none());
    }

    #[test]
    fn test_lower_edit_derives_upper() {
        let mut draft = GridDraft::default();
        assert!(draft.edit_lower_bound("70", dec!(100)));
        assert_eq!(draft.upper_bound, "130.00");
    }

    #[test]
    fn test_upper_below_price_keeps_lower() {
        let mut draft = GridDraft::default();
        draft.lower_bound = "90.00".to_string();
        assert!(draft.edit_upper_bound("95", dec!(100)));
        assert_eq!(draft.upper_bound, "95");
        assert_eq!(draft.lower_bound, "90.00");
        assert_eq!(draft.bound_error(), Some(&BoundError::UpperNotAboveCurrent));
        assert_eq!(
            draft.bound_error().unwrap().to_string(),
            "upper bound must be above current price"
        );
    }

    #[test]
    fn test_derived_lower_must_be_positive() {
        assert_eq!(
            derive_lower_bound(dec!(250), dec!(100)),
            Err(BoundError::LowerNotPositive)
        );
        assert_eq!(
            derive_lower_bound(dec!(200), dec!(100)),
            Err(BoundError::LowerNotPositive)
        );
        assert_eq!(derive_lower_bound(dec!(199.5), dec!(100)), Ok(dec!(0.5)));
    }

    #[test]
    fn test_derive_upper_rejects_lower_above_price() {
        assert_eq!(
            derive_upper_bound(dec!(100), dec!(100)),
            Err(BoundError::LowerNotBelowCurrent)
        );
        assert_eq!(
            derive_upper_bound(dec!(0), dec!(100)),
            Err(BoundError::LowerNotPositive)
        );
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(dec!(80)), "80.00");
        assert_eq!(format_price(dec!(0.123)), "0.12");
        assert_eq!(format_price(dec!(99.999)), "100.00");
    }

    #[test]
    fn test_grid_levels_limits() {
        assert_eq!(
            validate_grid_levels("1").unwrap_err().to_string(),
            "grid levels must be at least 2"
        );
        assert_eq!(
            validate_grid_levels("150").unwrap_err().to_string(),
            "grid levels cannot exceed 100"
        );
        assert!(validate_grid_levels("5").is_ok());
        assert!(validate_grid_levels("2").is_ok());
        assert!(validate_grid_levels("100").is_ok());
        assert!(validate_grid_levels("").is_ok());
    }

    #[test]
    fn test_grid_ratio_only_checked_for_geometric() {
        assert!(validate_grid_ratio("5", GridType::Arithmetic).is_ok());
        assert_eq!(
            validate_grid_ratio("1", GridType::Geometric),
            Err(ValidationError::RatioOutOfRange)
        );
        assert_eq!(
            validate_grid_ratio("0", GridType::Geometric),
            Err(ValidationError::RatioOutOfRange)
        );
        assert!(validate_grid_ratio("0.05", GridType::Geometric).is_ok());
    }

    #[test]
    fn test_total_margin_positive() {
        assert_eq!(
            validate_total_margin("0"),
            Err(ValidationError::MarginNotPositive)
        );
        assert!(validate_total_margin("0.01").is_ok());
        assert_eq!(
            validate_total_margin("."),
            Err(ValidationError::NotANumber(DraftField::TotalMargin))
        );
    }

    #[test]
    fn test_stop_prices_follow_direction() {
        let price = dec!(100);

        assert!(validate_stop_loss("90", Direction::Long, price).is_ok());
        assert_eq!(
            validate_stop_loss("100", Direction::Long, price),
            Err(ValidationError::StopLossWrongSide(Direction::Long))
        );
        assert!(validate_stop_loss("110", Direction::Short, price).is_ok());
        assert!(validate_stop_loss("100", Direction::Short, price).is_err());

        assert!(validate_take_profit("110", Direction::Long, price).is_ok());
        assert!(validate_take_profit("100", Direction::Long, price).is_err());
        assert!(validate_take_profit("90", Direction::Short, price).is_ok());
        assert_eq!(
            validate_take_profit("105", Direction::Short, price)
                .unwrap_err()
                .to_string(),
            "take-profit price must be below current price for a SHORT grid"
        );
    }

    #[test]
    fn test_submittable_draft() {
        let price = dec!(100);
        let draft = ready_draft(price);
        assert!(draft.is_submittable(price));

        let config = draft.build(price).unwrap();
        assert_eq!(config.upper_bound, dec!(120));
        assert_eq!(config.lower_bound, dec!(80));
        assert_eq!(config.grid_levels, 10);
        assert_eq!(config.grid_ratio, None);
    }

    #[test]
    fn test_not_submittable_when_field_missing_or_invalid() {
        let price = dec!(100);

        let mut draft = ready_draft(price);
        draft.total_margin.clear();
        assert!(!draft.is_submittable(price));
        assert_eq!(
            draft.build(price).unwrap_err(),
            vec![ValidationError::Missing(DraftField::TotalMargin)]
        );

        let mut draft = ready_draft(price);
        assert!(draft.edit_field(DraftField::GridLevels, "1"));
        assert!(!draft.is_submittable(price));

        let mut draft = ready_draft(price);
        assert!(draft.edit_upper_bound("90", price));
        assert!(!draft.is_submittable(price));
    }

    #[test]
    fn test_geometric_requires_valid_ratio() {
        let price = dec!(100);
        let mut draft = ready_draft(price);
        draft.grid_type = GridType::Geometric;
        assert!(!draft.is_submittable(price));

        assert!(draft.edit_field(DraftField::GridRatio, "1.5"));
        assert!(!draft.is_submittable(price));

        assert!(draft.edit_field(DraftField::GridRatio, "0.02"));
        assert!(draft.is_submittable(price));
        assert_eq!(draft.build(price).unwrap().grid_ratio, Some(dec!(0.02)));
    }

    #[test]
    fn test_build_rechecks_moved_price() {
        let draft = ready_draft(dec!(100));
        let errors = draft.build(dec!(125)).unwrap_err();
        assert!(errors.contains(&ValidationError::Bound(BoundError::UpperNotAboveCurrent)));
    }

    #[test]
    fn test_grid_levels_reject_decimals() {
        let mut draft = GridDraft::default();
        assert!(!draft.edit_field(DraftField::GridLevels, "2.5"));
        assert!(draft.grid_levels.is_empty());
    }

    #[test]
    fn test_config_serializes_uppercase_enums() {
        let config = ready_draft(dec!(100)).build(dec!(100)).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["direction"], "LONG");
        assert_eq!(json["grid_type"], "ARITHMETIC");
        assert!(json.get("grid_ratio").is_none());
    }
}
