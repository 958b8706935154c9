//! The failure log: append failures to a named list and page through them.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::FailureLogConfig;
use crate::error::{MalformedRecord, Result};
use crate::record::{ExceptionInfo, FailureRecord, Payload, RecordEncoder};
use crate::store::{create_list_store, ListStore};
use crate::window::{self, Order};

/// Parameters for [`FailureLog::each`].
///
/// `offset` defaults to the start of the list and `limit` to its current
/// length. With a `class_name`, only records whose payload class matches are
/// yielded and `limit` bounds the number of matches rather than the number of
/// entries read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EachRequest {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub order: Order,
    pub class_name: Option<String>,
}

impl EachRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

/// One entry yielded by [`Failures`]
pub type FailureEntry = (usize, std::result::Result<FailureRecord, MalformedRecord>);

/// Entries fetched by a single [`FailureLog::each`] call.
///
/// Holds the raw bytes of one range read and decodes them as it is advanced.
/// Records appended after the call are never visible here.
#[derive(Debug)]
pub struct Failures {
    entries: std::vec::IntoIter<(usize, Vec<u8>)>,
    class_name: Option<String>,
    remaining: usize,
}

impl Failures {
    fn empty() -> Self {
        Self {
            entries: Vec::new().into_iter(),
            class_name: None,
            remaining: 0,
        }
    }
}

impl Iterator for Failures {
    type Item = FailureEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let (ordinal, raw) = self.entries.next()?;

            let decoded = match FailureRecord::from_json_slice(&raw) {
                Ok(record) => Ok(record),
                Err(cause) => Err(MalformedRecord { ordinal, raw, cause }),
            };

            let wanted = match (&self.class_name, &decoded) {
                (None, _) => true,
                (Some(class), Ok(record)) => record.payload.class == *class,
                (Some(_), Err(_)) => false,
            };

            if wanted {
                self.remaining -= 1;
                return Some((ordinal, decoded));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.entries.len().min(self.remaining);
        match self.class_name {
            Some(_) => (0, Some(upper)),
            None => (upper, Some(upper)),
        }
    }
}

/// Append-only log of job failures stored in a single list.
///
/// Holds no state of its own besides the store handle, so it can be shared
/// freely between workers.
#[derive(Clone)]
pub struct FailureLog {
    store: Arc<dyn ListStore>,
    key: String,
    encoder: RecordEncoder,
}

impl FailureLog {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self {
            store,
            key: crate::config::DEFAULT_LIST_KEY.to_string(),
            encoder: RecordEncoder::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_encoder(mut self, encoder: RecordEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Build the store named in `config` and a log on top of it
    pub async fn from_config(config: &FailureLogConfig) -> Result<Self> {
        let store = create_list_store(&config.store).await?;

        let mut encoder = RecordEncoder::new();
        if let Some(marker) = &config.backtrace_cutoff {
            encoder = encoder.with_backtrace_cutoff(marker.clone());
        }

        Ok(Self::new(store)
            .with_key(config.list_key.clone())
            .with_encoder(encoder))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn encoder(&self) -> &RecordEncoder {
        &self.encoder
    }

    /// Encode a failure event and save it. Returns the record's ordinal.
    pub async fn record(
        &self,
        exception: &ExceptionInfo,
        worker: &str,
        queue: &str,
        payload: Payload,
    ) -> Result<usize> {
        let record = self.encoder.encode(exception, worker, queue, payload);
        self.save(&record).await
    }

    /// Append an encoded record to the tail of the list. Returns its ordinal.
    pub async fn save(&self, record: &FailureRecord) -> Result<usize> {
        let bytes = record.to_json_bytes()?;
        let len = self.store.push(&self.key, bytes).await?;
        let ordinal = len.saturating_sub(1);

        debug!(
            key = %self.key,
            ordinal,
            exception = %record.exception,
            queue = %record.queue,
            "Saved failure record"
        );
        Ok(ordinal)
    }

    /// Page through the list.
    ///
    /// The window is `[offset, min(offset + limit, count))` in both orders;
    /// descending visits it newest first. Offsets and limits past the end
    /// shrink the result rather than failing. Reads the length once and the
    /// window once.
    pub async fn each(&self, request: &EachRequest) -> Result<Failures> {
        let len = self.store.len(&self.key).await?;
        let offset = request.offset.unwrap_or(0);
        let limit = request.limit.unwrap_or(len);

        // A class filter can only be applied after decoding, so read
        // everything from the offset on and stop after `limit` matches.
        let read_limit = if request.class_name.is_some() { len } else { limit };

        let Some(window) = window::select(len, offset, read_limit).filter(|_| limit > 0) else {
            return Ok(Failures::empty());
        };

        let raw = self.store.range(&self.key, window.low, window.high).await?;
        debug!(
            key = %self.key,
            low = window.low,
            high = window.high,
            fetched = raw.len(),
            order = %request.order,
            "Fetched failure window"
        );

        // The store may return fewer entries than asked for; missing slots
        // are skipped.
        let mut slots: Vec<Option<Vec<u8>>> = raw.into_iter().map(Some).collect();
        let entries: Vec<(usize, Vec<u8>)> = window
            .ordinals(request.order)
            .filter_map(|ordinal| {
                let bytes = slots.get_mut(ordinal - window.low)?.take()?;
                Some((ordinal, bytes))
            })
            .collect();

        Ok(Failures {
            entries: entries.into_iter(),
            class_name: request.class_name.clone(),
            remaining: limit,
        })
    }

    /// Every record that decodes, in insertion order.
    ///
    /// Malformed entries are logged and skipped so one bad record cannot hide
    /// the rest.
    pub async fn all(&self) -> Result<Vec<FailureRecord>> {
        let failures = self.each(&EachRequest::default()).await?;

        Ok(failures
            .filter_map(|(_, decoded)| match decoded {
                Ok(record) => Some(record),
                Err(malformed) => {
                    warn!(
                        key = %self.key,
                        ordinal = malformed.ordinal,
                        raw = %malformed.raw_lossy(),
                        error = %malformed.cause,
                        "Skipping malformed failure record"
                    );
                    None
                }
            })
            .collect())
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.len(&self.key).await?)
    }

    /// Number of records whose payload class is `class_name`
    pub async fn count_by_class(&self, class_name: &str) -> Result<usize> {
        let request = EachRequest::default().class_name(class_name);
        Ok(self.each(&request).await?.count())
    }

    /// Drop everything in the underlying store
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear_all().await?;
        debug!(key = %self.key, "Cleared failure store");
        Ok(())
    }
}
