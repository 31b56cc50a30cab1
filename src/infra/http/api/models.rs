use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikesResponse {
    pub likes: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeStatusResponse {
    pub liked: bool,
}
