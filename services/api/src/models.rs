//! Domain models and request/response payloads

pub mod preset;
pub mod session;
pub mod user;

pub use preset::{
    FilePattern, NameCount, PageQuery, Pagination, Preset, PresetAuthor, PresetFilter,
    PresetInput, PresetListQuery, PresetListResponse, PresetPage, PresetPayload, PresetView,
    SortField, SortOrder, TagsQuery,
};
pub use session::{Session, SessionResponse, ValidateTokenRequest, ValidatedSession};
pub use user::{DEFAULT_ROLE, NewUser, User};
