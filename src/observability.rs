use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("parley.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("parley.stream.fragments");

pub(crate) static EXCHANGES: Counter = Counter::new("parley.chat.exchanges");
pub(crate) static EXCHANGES_ABANDONED: Counter = Counter::new("parley.chat.exchanges_abandoned");
pub(crate) static EXCHANGE_DURATION: Moments =
    Moments::new("parley.chat.exchange_duration_seconds");

pub(crate) static STORE_APPENDS: Counter = Counter::new("parley.store.appends");
pub(crate) static STORE_ERRORS: Counter = Counter::new("parley.store.errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAGMENTS);

    collector.register_counter(&EXCHANGES);
    collector.register_counter(&EXCHANGES_ABANDONED);
    collector.register_moments(&EXCHANGE_DURATION);

    collector.register_counter(&STORE_APPENDS);
    collector.register_counter(&STORE_ERRORS);
}
