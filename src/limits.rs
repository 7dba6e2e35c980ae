/// Widest visible window accepted, in days.
pub const MAX_DAY_COUNT: u32 = 366;

/// Cars accepted in one fleet snapshot.
pub const MAX_CARS: usize = 10_000;

/// Bookings accepted per car in one snapshot.
pub const MAX_BOOKINGS_PER_CAR: usize = 10_000;

/// Longest free-text search accepted.
pub const MAX_SEARCH_LEN: usize = 128;

/// Default cap on memoized views before the memo is cleared.
pub const DEFAULT_MAX_CACHED_VIEWS: usize = 256;

/// Default window width when a query leaves `days` out.
pub const DEFAULT_DAY_COUNT: u32 = 14;
