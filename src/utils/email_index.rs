//! Advisory in-memory index of registered emails.
//!
//! A cuckoo filter answers "definitely not registered" cheaply; a moka cache
//! remembers emails confirmed taken. Neither is authoritative: the UNIQUE key
//! on `users.email` is, and registration still relies on it.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static EMAIL_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// normalized email => taken
static TAKEN_EMAILS: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// False means the email is certainly not registered. True may be a false positive.
pub fn might_exist(email: &str) -> bool {
    let email = normalize(email);
    EMAIL_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&email)
}

/// True only when a previous registration or warmup confirmed the email.
pub async fn is_known_taken(email: &str) -> bool {
    if !might_exist(email) {
        return false;
    }
    TAKEN_EMAILS.get(&normalize(email)).await.unwrap_or(false)
}

/// Record a freshly registered email.
pub async fn remember(email: &str) {
    let email = normalize(email);
    EMAIL_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(&email);
    TAKEN_EMAILS.insert(email, true).await;
}

fn insert_batch(emails: &[String]) {
    let mut filter = EMAIL_FILTER.write().unwrap_or_else(PoisonError::into_inner);
    for email in emails {
        filter.add(email);
    }
}

async fn cache_batch(emails: &[String]) {
    let inserts: Vec<_> = emails
        .iter()
        .map(|e| TAKEN_EMAILS.insert(e.clone(), true))
        .collect();
    futures::future::join_all(inserts).await;
}

/// Streams every email in `users` into the index, `batch_size` at a time.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT email FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (email,) = row.map_err(|e| anyhow!("DB row fetch failed: {e}"))?;
        batch.push(normalize(&email));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            cache_batch(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
        cache_batch(&batch).await;
    }

    tracing::info!(total, "Email index warmup complete");
    Ok(total)
}
