//! Export — CSV views of both tiers for external analysis tools.
//!
//! - **Metrics CSV**: one row per (strategy, universe), one column per metric
//! - **Trades CSV**: the trade tape of a single detail artifact
//! - **Curves CSV**: bar-by-bar equity and drawdown of a single artifact
//!
//! These are read-only views; nothing here is ever loaded back into the store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stratvault_core::domain::{DetailArtifact, MetricsRecord, TradeRecord};

use crate::atomic::write_atomic;

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Metrics ────────────────────────────────────────────────────────

/// Export metrics records as CSV.
///
/// Columns: strategy_name, universe, then the sorted union of every metric
/// name. A record lacking a metric leaves that cell empty.
pub fn export_metrics_csv<'a, I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = &'a MetricsRecord>,
{
    let records: Vec<&MetricsRecord> = records.into_iter().collect();
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["strategy_name", "universe"];
    header.extend(columns.iter().copied());
    wtr.write_record(&header)?;

    for r in &records {
        let mut row = vec![r.strategy_name.clone(), r.universe.clone()];
        row.extend(
            columns
                .iter()
                .map(|c| r.metrics.get(*c).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

// ─── Detail ─────────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: symbol, side, entry_date, entry_price, exit_date, exit_price,
/// quantity, gross_pnl, commission, net_pnl, return_pct, bars_held, mae, mfe,
/// signal_type
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "side",
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "quantity",
        "gross_pnl",
        "commission",
        "net_pnl",
        "return_pct",
        "bars_held",
        "mae",
        "mfe",
        "signal_type",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.symbol,
            &format!("{:?}", t.side),
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_date.to_string(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.quantity),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.6}", t.return_pct()),
            &t.bars_held.to_string(),
            &format!("{:.2}", t.mae),
            &format!("{:.2}", t.mfe),
            &t.signal_type.clone().unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Export equity and drawdown curves side by side.
///
/// The curves may differ in length; missing cells are left empty.
pub fn export_curves_csv(equity: &[f64], drawdown: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "equity", "drawdown"])?;
    let cell = |v: Option<&f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    for i in 0..equity.len().max(drawdown.len()) {
        wtr.write_record([i.to_string(), cell(equity.get(i)), cell(drawdown.get(i))])?;
    }
    finish(wtr)
}

/// Write `trades.csv` and `curves.csv` for one artifact into
/// `output_dir/<strategy file stem>/`. Returns the created directory.
pub fn save_detail_csv(artifact: &DetailArtifact, output_dir: &Path) -> Result<PathBuf> {
    let file_name = crate::detail::key_file_name(&artifact.strategy_name);
    let stem = file_name
        .strip_suffix(".json")
        .unwrap_or(file_name.as_str());
    let dir = output_dir.join(stem);

    let trades = export_trades_csv(&artifact.trades)?;
    write_atomic(&dir.join("trades.csv"), trades.as_bytes())
        .with_context(|| format!("failed to write trades.csv under {}", dir.display()))?;

    let curves = export_curves_csv(&artifact.equity_curve, &artifact.drawdown_curve)?;
    write_atomic(&dir.join("curves.csv"), curves.as_bytes())
        .with_context(|| format!("failed to write curves.csv under {}", dir.display()))?;

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stratvault_core::domain::{MetricsMap, StrategyResult, TradeSide};

    // ─── Test helpers ────────────────────────────────────────────────

    fn record(name: &str, universe: &str, metrics: &[(&str, f64)]) -> MetricsRecord {
        MetricsRecord {
            strategy_name: name.into(),
            universe: universe.into(),
            metrics: metrics
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect::<MetricsMap>(),
        }
    }

    fn sample_trade() -> TradeRecord {
        TradeRecord {
            symbol: "SPY".into(),
            side: TradeSide::Long,
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            entry_price: 510.0,
            exit_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            exit_price: 530.0,
            quantity: 200.0,
            gross_pnl: 4000.0,
            commission: 90.5,
            net_pnl: 3909.5,
            bars_held: 12,
            mae: -1200.0,
            mfe: 4500.0,
            signal_type: Some("donchian_breakout".into()),
        }
    }

    // ─── Metrics ─────────────────────────────────────────────────────

    #[test]
    fn metrics_columns_are_union_of_names() {
        let records = [
            record("a", "u1", &[("score", 0.9), ("sharpe", 1.5)]),
            record("b", "u2", &[("score", 0.4), ("cagr", 0.12)]),
        ];
        let csv = export_metrics_csv(&records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "strategy_name,universe,cagr,score,sharpe");
        assert_eq!(lines[1], "a,u1,,0.9,1.5");
        assert_eq!(lines[2], "b,u2,0.12,0.4,");
    }

    #[test]
    fn metrics_empty_is_header_only() {
        let csv = export_metrics_csv(&Vec::<MetricsRecord>::new()).unwrap();
        assert_eq!(csv.lines().collect::<Vec<_>>(), vec!["strategy_name,universe"]);
    }

    // ─── Detail ──────────────────────────────────────────────────────

    #[test]
    fn trades_content() {
        let csv = export_trades_csv(&[sample_trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), 15);
        assert!(lines[1].starts_with("SPY,Long,2024-03-15"));
        assert!(lines[1].contains("3909.50"));
        assert!(lines[1].ends_with("donchian_breakout"));
    }

    #[test]
    fn curves_pad_shorter_series() {
        let csv = export_curves_csv(&[100.0, 101.0, 99.5], &[0.0, 0.0]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "bar_index,equity,drawdown");
        assert_eq!(lines[1], "0,100.000000,0.000000");
        assert_eq!(lines[3], "2,99.500000,");
    }

    #[test]
    fn detail_bundle_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut r = StrategyResult::new("ma/cross", "u1").with_metric("score", 1.0);
        r.trades.push(sample_trade());
        r.equity_curve = vec![100.0, 103.9];
        r.drawdown_curve = vec![0.0, 0.0];
        let artifact = DetailArtifact::from_result(&r, "u1", 1);

        let dir = save_detail_csv(&artifact, tmp.path()).unwrap();
        assert!(dir.starts_with(tmp.path()));
        let trades = std::fs::read_to_string(dir.join("trades.csv")).unwrap();
        assert_eq!(trades.lines().count(), 2);
        assert!(dir.join("curves.csv").exists());
    }
}
