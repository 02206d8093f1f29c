//! Wire schema for the upstream provider's XML catalog.
//!
//! Deliberately permissive: every struct only names the fields the mapper
//! needs, and `quick-xml`'s serde deserializer ignores any attribute or
//! element it isn't told about, so new upstream fields never break decode.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename = "planList")]
pub struct PlanList {
    pub output: Output,
}

#[derive(Debug, Deserialize)]
pub struct Output {
    #[serde(rename = "base_plan", default)]
    pub base_plans: Vec<BasePlan>,
}

#[derive(Debug, Deserialize)]
pub struct BasePlan {
    #[serde(rename = "@title")]
    pub title: String,
    #[serde(rename = "@sell_mode")]
    pub sell_mode: String,
    #[serde(rename = "plan", default)]
    pub plans: Vec<Plan>,
}

#[derive(Debug, Deserialize)]
pub struct Plan {
    #[serde(rename = "@plan_start_date")]
    pub plan_start_date: String,
    #[serde(rename = "@plan_end_date")]
    pub plan_end_date: String,
    #[serde(rename = "zone", default)]
    pub zones: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
pub struct Zone {
    #[serde(rename = "@price")]
    pub price: f64,
    #[serde(rename = "@capacity", default)]
    pub capacity: i64,
}
