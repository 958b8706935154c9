//! Failure records and the encoder that builds them
//!
//! A [`FailureRecord`] is what ends up in the store, one JSON document per
//! list entry. Field order on the wire is fixed by declaration order:
//! `failed_at`, `payload`, `exception`, `error`, `backtrace`, `worker`,
//! `queue`.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::sanitize::{clean_utf8, filter_backtrace};

/// A single job argument.
///
/// Arguments are opaque to the failure log but must come back exactly as they
/// were saved, so each JSON shape gets its own variant instead of falling back
/// to an untyped value.
///
/// JSON has no representation for NaN or infinity, so a non-finite `Float`
/// fails to serialize instead of being written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`. Smaller values decode as `Int`.
    UInt(u64),
    #[serde(serialize_with = "finite_float")]
    Float(f64),
    String(String),
    List(Vec<ArgValue>),
    Map(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(signed) => ArgValue::Int(signed),
            Err(_) => ArgValue::UInt(value),
        }
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(values: Vec<T>) -> Self {
        ArgValue::List(values.into_iter().map(Into::into).collect())
    }
}

fn finite_float<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if !value.is_finite() {
        return Err(ser::Error::custom(format!(
            "non-finite float argument {} cannot be stored",
            value
        )));
    }
    serializer.serialize_f64(*value)
}

/// Description of the job that failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Job class name
    pub class: String,
    /// Positional arguments the job was enqueued with
    #[serde(default, deserialize_with = "one_or_many")]
    pub args: Vec<ArgValue>,
}

impl Payload {
    pub fn new(class: impl Into<String>, args: Vec<ArgValue>) -> Self {
        Self {
            class: class.into(),
            args,
        }
    }
}

// Producers other than this crate sometimes store a bare argument instead of
// an array.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ArgValue>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ArgValue>),
        One(ArgValue),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(values) => values,
        OneOrMany::One(value) => vec![value],
    })
}

/// The exception side of a failure event, as handed over by the job runner.
///
/// Message and frames are raw bytes: they are only turned into text by the
/// encoder, after sanitization.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub class: String,
    pub message: Vec<u8>,
    pub backtrace: Vec<Vec<u8>>,
}

impl ExceptionInfo {
    pub fn new(class: impl Into<String>, message: impl Into<Vec<u8>>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    pub fn with_backtrace<I, L>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        self.backtrace = frames.into_iter().map(Into::into).collect();
        self
    }

    /// Build from a Rust error value. The class is the error's type name
    /// without its module path; each `source()` in the chain becomes a
    /// `caused by:` frame.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut frames = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            frames.push(format!("caused by: {}", cause).into_bytes());
            source = cause.source();
        }

        Self {
            class: short_type_name::<E>().to_string(),
            message: err.to_string().into_bytes(),
            backtrace: frames,
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A persisted job failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(with = "failed_at_format")]
    pub failed_at: DateTime<Utc>,
    pub payload: Payload,
    /// Exception class name
    pub exception: String,
    /// Sanitized exception message
    pub error: String,
    #[serde(default)]
    pub backtrace: Vec<String>,
    pub worker: String,
    pub queue: String,
}

impl FailureRecord {
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_slice(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }
}

/// `failed_at` is stored as `YYYY/MM/DD HH:MM:SS UTC`, the format existing
/// dashboards read. RFC 3339 is accepted on decode.
mod failed_at_format {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub(super) const FORMAT: &str = "%Y/%m/%d %H:%M:%S UTC";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, FORMAT) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

/// Turns failure events into sanitized [`FailureRecord`]s.
///
/// Holds configuration only; building a record has no side effects.
#[derive(Debug, Clone, Default)]
pub struct RecordEncoder {
    backtrace_cutoff: Option<String>,
}

impl RecordEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop backtrace frames from the first one containing `marker` onward
    pub fn with_backtrace_cutoff(mut self, marker: impl Into<String>) -> Self {
        self.backtrace_cutoff = Some(marker.into());
        self
    }

    pub fn backtrace_cutoff(&self) -> Option<&str> {
        self.backtrace_cutoff.as_deref()
    }

    /// Build a record stamped with the current time
    pub fn encode(
        &self,
        exception: &ExceptionInfo,
        worker: &str,
        queue: &str,
        payload: Payload,
    ) -> FailureRecord {
        self.encode_at(Utc::now(), exception, worker, queue, payload)
    }

    pub fn encode_at(
        &self,
        failed_at: DateTime<Utc>,
        exception: &ExceptionInfo,
        worker: &str,
        queue: &str,
        payload: Payload,
    ) -> FailureRecord {
        let message = clean_utf8(&exception.message);
        if message.was_modified {
            tracing::debug!(
                exception = %exception.class,
                details = message.details.as_deref().unwrap_or_default(),
                "Sanitized exception message"
            );
        }

        FailureRecord {
            // The stored format has second precision
            failed_at: failed_at.trunc_subsecs(0),
            payload,
            exception: exception.class.clone(),
            error: message.into_inner(),
            backtrace: filter_backtrace(&exception.backtrace, self.backtrace_cutoff()),
            worker: worker.to_string(),
            queue: queue.to_string(),
        }
    }
}
