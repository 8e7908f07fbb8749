//! ictlab core: domain types, cost model, strategies, and the trade simulator.
//!
//! Everything here is a pure function of its inputs: no I/O, no global
//! state, no threads. The runner crate parallelises over this.

pub mod cost_model;
pub mod domain;
pub mod rng;
pub mod simulator;
pub mod strategy;

pub use cost_model::{Commission, CostModel};
pub use simulator::{simulate, SimulationConfig, SimulationError, SimulationOutput};
pub use strategy::{Signal, Strategy, StrategyEvaluator, StrategyKind};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a worker thread touches is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::ParameterSet>();
        require_sync::<domain::ParameterSet>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::EquityPoint>();
        require_sync::<domain::EquityPoint>();

        require_send::<CostModel>();
        require_sync::<CostModel>();
        require_send::<SimulationConfig>();
        require_sync::<SimulationConfig>();
        require_send::<SimulationOutput>();
        require_sync::<SimulationOutput>();
        require_send::<SimulationError>();
        require_sync::<SimulationError>();

        require_send::<Strategy>();
        require_sync::<Strategy>();
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();
    }

    /// Strategies see bars and parameters only, never capital or position.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            strategy: &dyn StrategyEvaluator,
            bars: &[domain::Bar],
            params: &domain::ParameterSet,
        ) -> Option<Signal> {
            strategy.evaluate(bars, params)
        }
    }
}
