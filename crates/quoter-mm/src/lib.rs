//! Market making engine.
//!
//! Turns order book and indicator state into a ladder of resting limit
//! orders per symbol and keeps it reconciled against the exchange:
//!
//! - [`analysis`]: technical analysis collaborator and market condition
//! - [`ladder`]: dynamic spread and quote ladder
//! - [`reconcile`]: cancel policy and gap-fill planning
//! - [`engine`]: timers, per-symbol cycles, events and shutdown

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod ladder;
pub mod reconcile;

pub use analysis::{
    BasicAnalyzer, IndicatorSnapshot, MarketCondition, Sentiment, StaticAnalyzer,
    TechnicalAnalyzer,
};
pub use config::MakerConfig;
pub use engine::{EngineStatus, MarketMakingEngine, ReconcileOutcome, SymbolStatus};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EngineStage};
pub use history::{IndicatorHistory, RollingWindow};
pub use ladder::{build_ladder, dynamic_spread, LadderBounds, QuoteLadder, QuoteLevel};
pub use reconcile::{CancelReason, PlacementPlan};
