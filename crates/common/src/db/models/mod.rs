//! SeaORM entity models
//!
//! Database entities for FollowRank

mod last_post;
mod participant;
mod rank_score;

pub use participant::{
    Entity as ParticipantEntity,
    Model as Participant,
    ActiveModel as ParticipantActiveModel,
    Column as ParticipantColumn,
};

pub use rank_score::{
    Entity as RankScoreEntity,
    Model as RankScore,
    ActiveModel as RankScoreActiveModel,
    Column as RankScoreColumn,
};

pub use last_post::{
    Entity as LastPostEntity,
    Model as LastPost,
    ActiveModel as LastPostActiveModel,
    Column as LastPostColumn,
};
