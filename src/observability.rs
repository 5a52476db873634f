use biometrics::{Collector, Counter, Moments};

pub(crate) static CHAT_REQUESTS: Counter = Counter::new("chatsh.chat.requests");
pub(crate) static CHAT_REQUEST_ERRORS: Counter = Counter::new("chatsh.chat.request_errors");
pub(crate) static CHAT_REQUEST_DURATION: Moments =
    Moments::new("chatsh.chat.request_duration_seconds");
pub(crate) static CHAT_INTROSPECTIONS: Counter = Counter::new("chatsh.chat.introspections");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("chatsh.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatsh.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatsh.stream.bytes");

pub(crate) static COMMANDS_EXECUTED: Counter = Counter::new("chatsh.command.executed");
pub(crate) static COMMANDS_SKIPPED: Counter = Counter::new("chatsh.command.skipped");
pub(crate) static COMMAND_FAILURES: Counter = Counter::new("chatsh.command.failures");
pub(crate) static COMMAND_DURATION: Moments = Moments::new("chatsh.command.duration_seconds");

pub(crate) static HISTORY_WRITES: Counter = Counter::new("chatsh.history.writes");
pub(crate) static HISTORY_WRITE_ERRORS: Counter = Counter::new("chatsh.history.write_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CHAT_REQUESTS);
    collector.register_counter(&CHAT_REQUEST_ERRORS);
    collector.register_moments(&CHAT_REQUEST_DURATION);
    collector.register_counter(&CHAT_INTROSPECTIONS);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&COMMANDS_EXECUTED);
    collector.register_counter(&COMMANDS_SKIPPED);
    collector.register_counter(&COMMAND_FAILURES);
    collector.register_moments(&COMMAND_DURATION);

    collector.register_counter(&HISTORY_WRITES);
    collector.register_counter(&HISTORY_WRITE_ERRORS);
}
