use std::sync::atomic::{AtomicU64, Ordering};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// creates a process-unique identifier. ids are opaque strings: a base-36
/// timestamp prefix keeps ids from separate runs apart, the counter suffix
/// keeps ids within a run apart.
pub fn new_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let count = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", to_base36(millis), to_base36_padded(count, 6))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return String::from("0");
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn to_base36_padded(value: u64, width: usize) -> String {
    format!("{:0>width$}", to_base36(value), width = width)
}
