use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ConditionError;
use crate::metrics::{Metric, MetricResolver};
use crate::models::{CourseId, ForumId, UserId, ALL_FORUMS};
use crate::store::ForumStore;
use crate::tree::TimeWindow;

pub const CONDITION_TYPE: &str = "forummetric";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub forum: Option<ForumId>,
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagementinternational: Option<bool>,
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fromdate: Option<DateSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todate: Option<DateSetting>,
}

// Form fields arrive as strings ("forum": "1"); unparseable input reads as unset.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ForumId>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSetting {
    #[serde(default)]
    pub enabled: bool,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl DateSetting {
    pub fn resolve(&self, offset: &FixedOffset) -> Result<Option<i64>, ConditionError> {
        if !self.enabled {
            return Ok(None);
        }
        let Some(date) = self.date.as_deref() else {
            return Ok(None);
        };
        let time = self.time.as_deref().unwrap_or("00:00:00");
        let invalid = || ConditionError::InvalidDate {
            date: date.to_string(),
            time: time.to_string(),
        };

        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
        let clock = NaiveTime::parse_from_str(time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
            .map_err(|_| invalid())?;
        offset
            .from_local_datetime(&day.and_time(clock))
            .single()
            .map(|dt| Some(dt.timestamp()))
            .ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    MoreThan,
    LessThan,
}

impl Comparison {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "morethan" => Some(Self::MoreThan),
            "lessthan" => Some(Self::LessThan),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MoreThan => "more than",
            Self::LessThan => "less than",
        }
    }

    /// Strict comparison; equal never satisfies.
    pub fn satisfied_by(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::MoreThan => value > threshold,
            Self::LessThan => value < threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricCondition {
    forum: Option<ForumId>,
    metric: Option<String>,
    international: bool,
    comparison: Option<Comparison>,
    comparison_key: Option<String>,
    threshold: Option<f64>,
    fromdate: Option<DateSetting>,
    todate: Option<DateSetting>,
    window: TimeWindow,
    offset: FixedOffset,
    valid: bool,
}

impl MetricCondition {
    pub fn from_payload(payload: ConditionPayload, offset: FixedOffset) -> Result<Self, ConditionError> {
        if let Some(kind) = payload.kind.as_deref() {
            if kind != CONDITION_TYPE {
                return Err(ConditionError::WrongType(kind.to_string()));
            }
        }

        let from = match &payload.fromdate {
            Some(setting) => setting.resolve(&offset)?,
            None => None,
        };
        let to = match &payload.todate {
            Some(setting) => setting.resolve(&offset)?,
            None => None,
        };

        let comparison = payload.condition.as_deref().and_then(Comparison::parse);
        let valid = payload.forum.is_some()
            && payload.metric.is_some()
            && comparison.is_some()
            && payload.value.is_some_and(f64::is_finite);
        if !valid {
            debug!(?payload, "condition is missing required fields");
        }

        Ok(Self {
            forum: payload.forum,
            metric: payload.metric,
            international: payload.engagementinternational.unwrap_or(false),
            comparison,
            comparison_key: payload.condition,
            threshold: payload.value,
            fromdate: payload.fromdate,
            todate: payload.todate,
            window: TimeWindow::new(from, to),
            offset,
            valid,
        })
    }

    pub fn from_json(json: &str, offset: FixedOffset) -> Result<Self, ConditionError> {
        let payload: ConditionPayload = serde_json::from_str(json)?;
        Self::from_payload(payload, offset)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn metric(&self) -> Option<Metric> {
        self.metric
            .as_deref()
            .and_then(|name| Metric::parse(name, self.international))
    }

    /// Raw metric value for the user, `None` when there is no signal.
    pub fn user_value<S: ForumStore + ?Sized>(
        &self,
        store: &S,
        course_id: CourseId,
        user_id: UserId,
    ) -> Option<i64> {
        let forum = self.forum?;
        let name = self.metric.as_deref()?;
        MetricResolver::new(store, course_id, forum, self.window).resolve_name(
            name,
            self.international,
            user_id,
        )
    }

    pub fn evaluate(&self, negate: bool, value: Option<i64>) -> bool {
        if !self.valid {
            return false;
        }
        let (Some(value), Some(comparison), Some(threshold)) = (value, self.comparison, self.threshold)
        else {
            return false;
        };
        let satisfies = comparison.satisfied_by(value as f64, threshold);
        satisfies != negate
    }

    pub fn is_available<S: ForumStore + ?Sized>(
        &self,
        negate: bool,
        store: &S,
        course_id: CourseId,
        user_id: UserId,
    ) -> bool {
        if !self.valid {
            debug!(user_id, "invalid condition is never available");
            return false;
        }
        let value = self.user_value(store, course_id, user_id);
        let available = self.evaluate(negate, value);
        debug!(user_id, ?value, negate, available, "evaluated forum metric condition");
        available
    }

    pub fn describe<S: ForumStore + ?Sized>(&self, _full: bool, negate: bool, store: &S) -> Description {
        let range = match (self.window.from, self.window.to) {
            (Some(_), None) => "from",
            (None, Some(_)) => "to",
            (Some(_), Some(_)) => "between",
            (None, None) => "",
        };
        let prefix = if negate {
            "notavailabilitydescription"
        } else {
            "availabilitydescription"
        };

        let metric = match self.metric() {
            Some(metric) => metric.label(),
            None => self.metric.clone().unwrap_or_default(),
        };
        let forum = match self.forum {
            Some(ALL_FORUMS) => "All forums".to_string(),
            Some(id) => store
                .forum_name(id)
                .unwrap_or_else(|| format!("forum {id}")),
            None => String::new(),
        };
        let condition = match self.comparison {
            Some(comparison) => comparison.label().to_string(),
            None => self.comparison_key.clone().unwrap_or_default(),
        };

        Description {
            key: format!("{prefix}{range}"),
            params: DescriptionParams {
                metric,
                forum,
                condition,
                value: self.threshold.map(|value| value.to_string()).unwrap_or_default(),
                from: self.format_timestamp(self.window.from),
                to: self.format_timestamp(self.window.to),
            },
        }
    }

    fn format_timestamp(&self, timestamp: Option<i64>) -> String {
        timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.with_timezone(&self.offset).format("%-d %B %Y, %H:%M").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn save(&self) -> ConditionPayload {
        ConditionPayload {
            kind: Some(CONDITION_TYPE.to_string()),
            forum: self.forum,
            metric: self.metric.clone(),
            engagementinternational: matches!(self.metric(), Some(Metric::MaxEngagement { .. }))
                .then_some(self.international),
            condition: self.comparison_key.clone(),
            value: self.threshold,
            fromdate: self.fromdate.clone(),
            todate: self.todate.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub key: String,
    pub params: DescriptionParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionParams {
    pub metric: String,
    pub forum: String,
    pub condition: String,
    pub value: String,
    pub from: String,
    pub to: String,
}

impl Description {
    pub fn render(&self) -> String {
        let p = &self.params;
        let verb = if self.key.starts_with("not") {
            "must not be"
        } else {
            "must be"
        };
        let range = if self.key.ends_with("between") {
            format!(" between {} and {}", p.from, p.to)
        } else if self.key.ends_with("from") {
            format!(" from {}", p.from)
        } else if self.key.ends_with("to") {
            format!(" to {}", p.to)
        } else {
            String::new()
        };
        format!(
            "{}{} in \"{}\" {} {} {}.",
            p.metric, range, p.forum, verb, p.condition, p.value
        )
    }
}
