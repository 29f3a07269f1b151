//! Check Bounds Command
//!
//! Feeds command-line values through the same draft the creation form uses
//! and prints the derived bounds, every field error, and the typed config
//! when the draft is submittable.

use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

use grid_sync::bounds::DraftField;
use grid_sync::{Direction, GridDraft, GridType};

pub struct BoundsArgs {
    pub price: String,
    pub direction: String,
    pub grid_type: String,
    pub upper: Option<String>,
    pub lower: Option<String>,
    pub levels: Option<String>,
    pub ratio: Option<String>,
    pub margin: Option<String>,
    pub stop_loss: Option<String>,
    pub take_profit: Option<String>,
}

pub fn run(args: BoundsArgs) -> Result<()> {
    let current_price = Decimal::from_str(args.price.trim())
        .with_context(|| format!("Invalid current price '{}'", args.price))?;
    let direction = Direction::from_str(&args.direction).map_err(|e| anyhow!(e))?;
    let grid_type = GridType::from_str(&args.grid_type).map_err(|e| anyhow!(e))?;

    let mut draft = GridDraft::new(direction, grid_type);

    if let Some(upper) = &args.upper {
        if !draft.edit_upper_bound(upper, current_price) {
            bail!("Invalid numeric input for upper bound: '{}'", upper);
        }
    }
    if let Some(lower) = &args.lower {
        if !draft.edit_lower_bound(lower, current_price) {
            bail!("Invalid numeric input for lower bound: '{}'", lower);
        }
    }

    let fields = [
        (DraftField::GridLevels, &args.levels),
        (DraftField::GridRatio, &args.ratio),
        (DraftField::TotalMargin, &args.margin),
        (DraftField::StopBotPrice, &args.stop_loss),
        (DraftField::StopTopPrice, &args.take_profit),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if !draft.edit_field(field, value) {
                bail!("Invalid numeric input for {}: '{}'", field, value);
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("GRID CONFIGURATION CHECK");
    println!("{}", "=".repeat(60));
    println!("Current Price:      {}", current_price);
    println!("Direction:          {}", direction);
    println!("Upper Bound:        {}", display(&draft.upper_bound));
    println!("Lower Bound:        {}", display(&draft.lower_bound));
    println!("{}", "-".repeat(60));

    if let Some(err) = draft.bound_error() {
        println!("  ⚠ {}", err);
    }
    for (field, err) in draft.field_errors(current_price) {
        println!("  ⚠ {}: {}", field, err);
    }

    match draft.build(current_price) {
        Ok(config) => {
            println!("  ✓ Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Err(errors) => {
            let missing = errors
                .iter()
                .filter(|e| matches!(e, grid_sync::bounds::ValidationError::Missing(_)))
                .map(|e| e.to_string())
                .collect::<Vec<_>>();
            for message in &missing {
                println!("  ⚠ {}", message);
            }
            println!("  ✗ Configuration cannot be submitted");
        }
    }
    println!("{}\n", "=".repeat(60));

    Ok(())
}

fn display(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
