/*
    spotify-recs-rs | Rust CLI tool to generate Spotify track recommendations.
    Copyright (C) 2025  spotify-recs-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

pub mod agent;
pub mod auth;
pub mod models;
pub mod recommend;
pub mod retry;
pub mod spotify;

// Re-export key items for convenience
pub use agent::{build_agent, Agent, AgentError};
pub use auth::{begin_auth, AuthError, Credential, PendingAuth};
pub use models::{AgentTurn, Recommendation, RecommendedTrack, SeedSet, Selection};
pub use recommend::{MusicApi, RecommendError, Recommender, MAX_COUNT, MIN_COUNT};
pub use retry::RetryPolicy;
pub use spotify::SpotifyClient;
