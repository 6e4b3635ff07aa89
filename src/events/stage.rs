//! Pipeline stages and who may emit / consume which event.
//!
//! This is a convention checked by producers at their own boundary. The queue
//! accepts any variant from anyone.

use serde::{Deserialize, Serialize};

use super::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DataHandler,
    Strategy,
    Portfolio,
    ExecutionHandler,
    RiskManager,
    Accounting,
    CorporateActionHandler,
    SimulatorClock,
    Scheduler,
    Reporting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DataHandler => "data_handler",
            Stage::Strategy => "strategy",
            Stage::Portfolio => "portfolio",
            Stage::ExecutionHandler => "execution_handler",
            Stage::RiskManager => "risk_manager",
            Stage::Accounting => "accounting",
            Stage::CorporateActionHandler => "corporate_action_handler",
            Stage::SimulatorClock => "simulator_clock",
            Stage::Scheduler => "scheduler",
            Stage::Reporting => "reporting",
        }
    }

    pub fn may_emit(&self, event_type: EventType) -> bool {
        event_type.producers().contains(self)
    }

    pub fn consumes(&self, event_type: EventType) -> bool {
        event_type.consumers().contains(self)
    }
}

impl EventType {
    pub fn producers(&self) -> &'static [Stage] {
        use Stage::*;
        match self {
            EventType::MarketData => &[DataHandler],
            EventType::Signal => &[Strategy],
            // Risk may generate a forced rebalance.
            EventType::Order => &[Portfolio, RiskManager],
            EventType::Fill => &[ExecutionHandler],
            EventType::Position => &[Portfolio, Accounting],
            EventType::PnL => &[Accounting],
            EventType::Risk => &[RiskManager],
            EventType::CorporateAction => &[CorporateActionHandler, DataHandler],
            EventType::Latency => &[SimulatorClock, ExecutionHandler],
        }
    }

    pub fn consumers(&self) -> &'static [Stage] {
        use Stage::*;
        match self {
            EventType::MarketData => &[Strategy, Portfolio, RiskManager],
            EventType::Signal => &[Portfolio, RiskManager],
            EventType::Order => &[ExecutionHandler],
            EventType::Fill => &[Portfolio, Accounting, RiskManager],
            EventType::Position | EventType::PnL => &[Reporting, RiskManager],
            EventType::Risk => &[Portfolio, ExecutionHandler],
            EventType::CorporateAction => &[Portfolio, Accounting, Strategy],
            EventType::Latency => &[ExecutionHandler, Scheduler],
        }
    }
}
