//! `/ping`: a liveness probe with no payload.

pub async fn get() -> &'static str {
    ""
}
