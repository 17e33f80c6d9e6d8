//! Planning of transaction lines from decision events.
//!
//! The planner is pure: callers load the obligation's existing periods and
//! their months, and persist whatever the plan returns.

mod planner;

#[cfg(test)]
mod planner_props;

pub use planner::{
    EksisterendePeriode, HendelsePlan, PeriodePlan, Periodegrunnlag, PlanlagtKontering,
    plan_hendelse, plan_periode,
};
