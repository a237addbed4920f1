mod api;

pub use api::{
    ApiKeyRecord, KeyType, MessageResponse, ProcessStatusResponse, RateLimitedResponse,
};
