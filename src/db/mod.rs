//! Database layer (Supabase PostgREST).

pub mod postgrest;

pub use postgrest::PostgrestDb;

/// Table names as constants.
pub mod tables {
    /// One row per user, keyed by the auth user id
    pub const PROFILES: &str = "profiles";
}
