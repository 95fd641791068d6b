use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    pub static ref DISPATCH_COUNTER: CounterVec = register_counter_vec!(
        "notify_dispatch_total",
        "Relays to the automation webhook by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref SUBMISSIONS_COUNTER: CounterVec = register_counter_vec!(
        "contact_submissions_total",
        "WhatsApp number submissions by outcome",
        &["outcome"]
    ).unwrap();
}

pub fn record_dispatch(outcome: &str) {
    DISPATCH_COUNTER.with_label_values(&[outcome]).inc();
}

pub fn record_submission(outcome: &str) {
    SUBMISSIONS_COUNTER.with_label_values(&[outcome]).inc();
}
