//! Rollup metrics over the currently cached strategies
//!
//! Everything here is recomputed from the strategy list on every read;
//! nothing is stored.
//!
//! Note the two utilization figures use different rules: the snapshot-wide
//! `total_capital_utilization` is a plain sum of per-strategy percentages,
//! while each symbol summary carries the average for that symbol.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::types::GridStrategy;

/// Parse a decimal string, treating missing or malformed input as zero.
pub fn parse_decimal_or_zero(raw: Option<&str>) -> Decimal {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Decimal::ZERO;
    };
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or(Decimal::ZERO)
}

/// Per-symbol rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolSummary {
    pub count: usize,
    pub total_profit: Decimal,
    pub total_margin: Decimal,
    pub active_orders: u64,
    pub avg_capital_utilization: Decimal,
}

/// Derived view of the strategy list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedSnapshot {
    pub total_grid_profit: Decimal,
    pub total_margin_used: Decimal,
    /// Sum, not average, of per-strategy utilization
    pub total_capital_utilization: Decimal,
    pub strategies_by_symbol: BTreeMap<String, Vec<GridStrategy>>,
    pub symbol_summaries: BTreeMap<String, SymbolSummary>,
}

impl AggregatedSnapshot {
    pub fn strategy_count(&self) -> usize {
        self.symbol_summaries.values().map(|s| s.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_summaries.is_empty()
    }
}

/// Folds a strategy list into an [`AggregatedSnapshot`]
pub struct Aggregator;

impl Aggregator {
    pub fn compute(strategies: &[GridStrategy]) -> AggregatedSnapshot {
        let mut snapshot = AggregatedSnapshot::default();
        // Figures come from the service unchecked; sums saturate instead of overflowing
        // symbol -> summed utilization, averaged once all strategies are seen
        let mut utilization_sums: BTreeMap<String, Decimal> = BTreeMap::new();

        for strategy in strategies {
            let stats = &strategy.status.profit_statistics;
            let profit = stats.grid_profit();
            let margin = stats.total_margin_used();
            let utilization = stats.capital_utilization();

            snapshot.total_grid_profit = snapshot.total_grid_profit.saturating_add(profit);
            snapshot.total_margin_used = snapshot.total_margin_used.saturating_add(margin);
            snapshot.total_capital_utilization = snapshot
                .total_capital_utilization
                .saturating_add(utilization);

            snapshot
                .strategies_by_symbol
                .entry(strategy.ticker.clone())
                .or_default()
                .push(strategy.clone());

            let summary = snapshot
                .symbol_summaries
                .entry(strategy.ticker.clone())
                .or_default();
            summary.count += 1;
            summary.total_profit = summary.total_profit.saturating_add(profit);
            summary.total_margin = summary.total_margin.saturating_add(margin);
            summary.active_orders = summary
                .active_orders
                .saturating_add(u64::from(strategy.status.active_orders_count));

            let sum = utilization_sums
                .entry(strategy.ticker.clone())
                .or_insert(Decimal::ZERO);
            *sum = sum.saturating_add(utilization);
        }

        for (symbol, summary) in snapshot.symbol_summaries.iter_mut() {
            let sum = utilization_sums
                .get(symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            summary.avg_capital_utilization = sum / Decimal::from(summary.count);
        }

        snapshot
    }
}
