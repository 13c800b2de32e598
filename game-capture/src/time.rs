pub trait TimeSource {
    // Seconds since the unix epoch
    fn current_time(&self) -> i64;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_time(&self) -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }
}
