//! Maps the upstream XML catalog onto domain `Event`s.

use chrono::NaiveDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::domain::Event;

use super::xml::{BasePlan, PlanList, Zone};

const ISO_LOCAL_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";

fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, ISO_LOCAL_DATETIME).ok()
}

/// `(min_price, max_price)` in fixed-point cents over zones with positive
/// capacity; `(0, 0)` if none qualify.
fn price_range(zones: &[Zone]) -> (i64, i64) {
    let prices: Vec<i64> = zones
        .iter()
        .filter(|z| z.capacity > 0)
        .map(|z| (z.price * 100.0).round() as i64)
        .collect();

    match (prices.iter().min(), prices.iter().max()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => (0, 0),
    }
}

fn map_base_plan(plan: &BasePlan, out: &mut Vec<Event>) {
    if plan.sell_mode != "online" {
        return;
    }

    for p in &plan.plans {
        let Some(start) = parse_local_datetime(&p.plan_start_date) else {
            warn!(title = %plan.title, raw = %p.plan_start_date, "dropping plan with unparseable start date");
            continue;
        };
        let Some(end) = parse_local_datetime(&p.plan_end_date) else {
            warn!(title = %plan.title, raw = %p.plan_end_date, "dropping plan with unparseable end date");
            continue;
        };

        let (min_price, max_price) = price_range(&p.zones);

        match Event::new(
            Uuid::new_v4(),
            plan.title.clone(),
            start.date(),
            start.time(),
            end.date(),
            end.time(),
            min_price,
            max_price,
        ) {
            Ok(event) => out.push(event),
            Err(e) => warn!(title = %plan.title, error = %e, "dropping plan failing event invariants"),
        }
    }
}

pub fn map_plan_list(plan_list: &PlanList) -> Vec<Event> {
    let mut out = Vec::new();
    for base_plan in &plan_list.output.base_plans {
        map_base_plan(base_plan, &mut out);
    }
    out
}
