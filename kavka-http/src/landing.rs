//! The catch-all default handler, matching the original's fallback
//! route for any path no other handler claimed.

pub async fn get() -> &'static str {
    "kavka\n"
}
