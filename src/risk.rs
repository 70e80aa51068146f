use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Raw factors feeding the personal risk score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    /// Local hour, 0-23
    pub hour: u32,
    pub weekday: Weekday,
    /// 0.0-2.0
    pub location_risk: f64,
    /// 0.0-0.5
    pub weather_risk: f64,
}

impl RiskInputs {
    /// Time factors from `now`, location and weather drawn at random
    pub fn sample<Tz: TimeZone, R: Rng + ?Sized>(now: &DateTime<Tz>, rng: &mut R) -> Self {
        Self {
            hour: now.hour(),
            weekday: now.weekday(),
            location_risk: rng.gen_range(0.0..2.0),
            weather_risk: rng.gen_range(0.0..0.5),
        }
    }

    pub fn is_night(&self) -> bool {
        self.hour < 6 || self.hour > 20
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday, Weekday::Sat | Weekday::Sun)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub name: &'static str,
    pub score: f64,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Mean of the factors, rounded to one decimal
    pub score: f64,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

pub fn assess(inputs: &RiskInputs) -> RiskAssessment {
    let night = inputs.is_night();
    let time_risk = if night { 1.5 } else { 0.5 };
    let crowd_risk = if inputs.is_weekend() { 0.8 } else { 1.2 };

    let factors = vec![
        RiskFactor {
            name: "Time of Day",
            score: time_risk,
            description: if night {
                "Night time increases risk"
            } else {
                "Daytime is safer"
            },
        },
        RiskFactor {
            name: "Location Safety",
            score: inputs.location_risk,
            description: if inputs.location_risk > 1.0 {
                "Area has recent incidents"
            } else {
                "Area is generally safe"
            },
        },
        RiskFactor {
            name: "Crowd Density",
            score: crowd_risk,
            description: if crowd_risk > 1.0 {
                "Low crowd density"
            } else {
                "Good crowd presence"
            },
        },
        RiskFactor {
            name: "Weather Conditions",
            score: inputs.weather_risk,
            description: if inputs.weather_risk > 0.3 {
                "Poor visibility conditions"
            } else {
                "Clear conditions"
            },
        },
    ];

    let total = factors.iter().map(|f| f.score).sum::<f64>() / factors.len() as f64;
    // level uses the unrounded mean
    let level = if total < 1.0 {
        RiskLevel::Low
    } else if total < 2.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    RiskAssessment {
        score: (total * 10.0).round() / 10.0,
        level,
        factors,
    }
}
