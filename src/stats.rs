use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::constants::{DEFAULT_TOP_N, HIGH_SPEED_KPH, NOT_AVAILABLE, SPEED_THRESHOLD_KPH};
use crate::types::{Alert, AlertField, StatItem};

/// Group by `field`, rank by descending count, keep at most `n` groups.
/// Ties keep first-encounter order. Empty values group under `"N/A"`.
pub fn top_stats(alerts: &[Alert], field: AlertField, n: usize) -> Vec<StatItem> {
    let mut order: Vec<StatItem> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for alert in alerts {
        let mut name = field.value(alert);
        if name.is_empty() {
            name = NOT_AVAILABLE.to_string();
        }
        match slots.get(&name) {
            Some(&slot) => order[slot].count += 1,
            None => {
                slots.insert(name.clone(), order.len());
                order.push(StatItem { name, count: 1 });
            }
        }
    }

    // sort_by is stable
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(n);
    order
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedBand {
    /// 80 km/h and above
    High,
    /// 50 to 79 km/h
    Medium,
}

impl SpeedBand {
    pub fn of(speed_kph: u32) -> Option<Self> {
        if speed_kph >= HIGH_SPEED_KPH {
            Some(SpeedBand::High)
        } else if speed_kph >= SPEED_THRESHOLD_KPH {
            Some(SpeedBand::Medium)
        } else {
            None
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SpeedBand::High => "Alertas de Alta Velocidad (>= 80 km/h)",
            SpeedBand::Medium => "Alertas de Velocidad Media (50-79 km/h)",
        }
    }
}

/// Split alerts into (high, medium), preserving order within each band
pub fn partition_by_band(alerts: &[Alert]) -> (Vec<Alert>, Vec<Alert>) {
    let mut high = Vec::new();
    let mut medium = Vec::new();
    for alert in alerts {
        match SpeedBand::of(alert.speed_kph) {
            Some(SpeedBand::High) => high.push(alert.clone()),
            Some(SpeedBand::Medium) => medium.push(alert.clone()),
            None => {}
        }
    }
    (high, medium)
}

/// Headline figures for the analytics view and the summary collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_alerts: usize,
    pub high_speed_alerts: usize,
    pub medium_speed_alerts: usize,
    pub unique_vehicles: usize,
    pub top_plates: Vec<StatItem>,
    pub top_contracts: Vec<StatItem>,
    pub top_operators: Vec<StatItem>,
}

impl DashboardSummary {
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        let count_band = |band: SpeedBand| {
            alerts
                .iter()
                .filter(|a| SpeedBand::of(a.speed_kph) == Some(band))
                .count()
        };
        let unique_vehicles = alerts.iter().map(|a| a.plate.as_str()).collect::<HashSet<_>>().len();

        Self {
            total_alerts: alerts.len(),
            high_speed_alerts: count_band(SpeedBand::High),
            medium_speed_alerts: count_band(SpeedBand::Medium),
            unique_vehicles,
            top_plates: top_stats(alerts, AlertField::Plate, DEFAULT_TOP_N),
            top_contracts: top_stats(alerts, AlertField::Contract, DEFAULT_TOP_N),
            top_operators: top_stats(alerts, AlertField::Operator, DEFAULT_TOP_N),
        }
    }
}
