pub mod chat_completion;
pub mod http_client;
pub mod nominatim;
pub mod rate_limiter_adapter;
pub mod serper;
pub mod sqlite_store;
pub mod supabase_store;
