//! TradeRecord — a completed round-trip trade as reported by the backtest engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a round-trip trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

/// A complete round-trip trade record: entry → exit.
///
/// Stored verbatim inside detail-tier artifacts; the store never interprets
/// these fields beyond hashing them for collision detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub symbol: String,
    pub side: TradeSide,

    // ── Entry ──
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_date: NaiveDate,
    pub exit_price: f64,

    // ── Size ──
    pub quantity: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,

    // ── Duration ──
    pub bars_held: usize,

    // ── Excursion ──
    /// Maximum adverse excursion (worst unrealized loss during the trade).
    #[serde(default)]
    pub mae: f64,
    /// Maximum favorable excursion (best unrealized gain during the trade).
    #[serde(default)]
    pub mfe: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry cost.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    /// Every floating-point field, labelled by its serialized name.
    pub fn float_fields(&self) -> [(&'static str, f64); 8] {
        [
            ("entry_price", self.entry_price),
            ("exit_price", self.exit_price),
            ("quantity", self.quantity),
            ("gross_pnl", self.gross_pnl),
            ("commission", self.commission),
            ("net_pnl", self.net_pnl),
            ("mae", self.mae),
            ("mfe", self.mfe),
        ]
    }
}
