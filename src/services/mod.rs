pub mod fan_out;
pub mod playlists;
pub mod providers;
pub mod recommendations;
pub mod remote;
pub mod resolver;
pub mod similarity;
pub mod tag_fallback;

pub use playlists::PlaylistService;
pub use recommendations::{RecommendationService, RecommendationSettings};
pub use remote::{HttpTransport, RateLimitedClient, ReqwestTransport};
