use chrono::Utc;

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
