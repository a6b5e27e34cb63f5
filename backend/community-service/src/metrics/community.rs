use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    /// Duration of feed assembly, split by whether the request was paged.
    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "community_feed_request_duration_seconds",
        "Feed assembly duration segmented by mode",
        &["mode"]
    )
    .expect("failed to register community_feed_request_duration_seconds");

    pub static ref FEED_REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "community_feed_request_total",
        "Total feed requests segmented by mode",
        &["mode"]
    )
    .expect("failed to register community_feed_request_total");

    /// Mutations by action (create, edit, delete, reply, like, vote) and outcome.
    pub static ref MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "community_mutations_total",
        "Mutation requests segmented by action and outcome",
        &["action", "outcome"]
    )
    .expect("failed to register community_mutations_total");

    pub static ref AUTHZ_DENIALS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "community_authz_denials_total",
        "Authorization denials segmented by action",
        &["action"]
    )
    .expect("failed to register community_authz_denials_total");

    /// Conditional writes that lost a race and were retried (like toggles,
    /// child appends, unversioned edits).
    pub static ref WRITE_RETRIES_TOTAL: IntCounter = register_int_counter!(
        "community_write_retries_total",
        "Conditional write retries after a version conflict"
    )
    .expect("failed to register community_write_retries_total");

    pub static ref PROFILE_CACHE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "community_profile_cache_lookups_total",
        "Profile cache lookups segmented by result",
        &["result"]
    )
    .expect("failed to register community_profile_cache_lookups_total");

    pub static ref PROFILE_CACHE_EVICTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "community_profile_cache_evictions_total",
        "Profile cache evictions segmented by reason",
        &["reason"]
    )
    .expect("failed to register community_profile_cache_evictions_total");

    /// Roles that failed canonicalization, by where they were seen.
    pub static ref UNRECOGNIZED_ROLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "community_unrecognized_roles_total",
        "Role strings that did not canonicalize",
        &["source"]
    )
    .expect("failed to register community_unrecognized_roles_total");
}
