/// Read-through caching on top of [`crate::db::Cache`].
///
/// Returns the cached value when present. Otherwise awaits `$block`, queues the
/// result for a background write with `$ttl` seconds to live, and returns it.
/// A failed cache lookup is logged and treated as a miss. Errors from the block
/// are propagated with `?`, so the macro must be used inside a function
/// returning `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let result: RecommendationResult = cached!(
///     cache,
///     CacheKey::recommendations(seed.kind, &seed.id, &ctx.access_token),
///     300,
///     async move { self.generate_uncached(seed, ctx).await }
/// )?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        let hit = match $cache.get_from_cache(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, computing fresh value");
                None
            }
        };
        if let Some(cached) = hit {
            tracing::debug!(key = %key, "Cache hit");
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
